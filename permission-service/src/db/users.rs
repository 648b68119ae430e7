use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::User;

const USER_COLUMNS: &str = "user_id, email, display_name, direct_permissions, \
    effective_permissions, permissions_refreshed_utc, created_utc";

pub async fn find_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<User>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE user_id = $1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Lock the user row for a read-modify-write of its permission columns.
pub async fn lock_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<User>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE user_id = $1 FOR UPDATE",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn user_exists<'e, E>(executor: E, user_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
        .bind(user_id)
        .fetch_one(executor)
        .await
}

pub async fn set_direct_permissions<'e, E>(
    executor: E,
    user_id: Uuid,
    permissions: &[String],
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE users SET direct_permissions = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(permissions)
        .execute(executor)
        .await?;
    Ok(())
}

/// Persist the resolved set. Returns false when the user does not exist.
pub async fn set_effective_permissions<'e, E>(
    executor: E,
    user_id: Uuid,
    permissions: &[String],
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET effective_permissions = $2, permissions_refreshed_utc = NOW()
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(permissions)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Permissions contributed by active roles through active, unexpired assignments.
pub async fn role_permissions_for_user<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Vec<String>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT DISTINCT unnest(r.permissions)
        FROM staff_role_assignments a
        JOIN staff_members s ON s.staff_id = a.staff_id
        JOIN roles r ON r.role_id = a.role_id
        WHERE s.user_id = $1
          AND a.is_active
          AND r.is_active
          AND (a.expires_utc IS NULL OR a.expires_utc > NOW())
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Users that hold at least one active assignment of the role.
pub async fn user_ids_holding_role<'e, E>(
    executor: E,
    role_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT DISTINCT s.user_id
        FROM staff_role_assignments a
        JOIN staff_members s ON s.staff_id = a.staff_id
        WHERE a.role_id = $1 AND a.is_active
        "#,
    )
    .bind(role_id)
    .fetch_all(executor)
    .await
}
