use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::StaffMember;

pub async fn find_staff<'e, E>(
    executor: E,
    staff_id: Uuid,
) -> Result<Option<StaffMember>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, StaffMember>(
        r#"
        SELECT staff_id, user_id, department_id, job_title, is_active, created_utc
        FROM staff_members
        WHERE staff_id = $1
        "#,
    )
    .bind(staff_id)
    .fetch_optional(executor)
    .await
}

pub async fn find_staff_by_user<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<StaffMember>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, StaffMember>(
        r#"
        SELECT staff_id, user_id, department_id, job_title, is_active, created_utc
        FROM staff_members
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}
