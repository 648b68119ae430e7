use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{AssignmentDetail, AssignmentScope, StaffRoleAssignment};

const ASSIGNMENT_COLUMNS: &str = "assignment_id, staff_id, role_id, scope_code, scope_id, \
    conditions, assigned_by, assigned_utc, expires_utc, is_active, updated_utc";

/// Row for the exact (staff, role, scope, scope_id) key, locked.
pub async fn lock_by_key<'e, E>(
    executor: E,
    staff_id: Uuid,
    role_id: Uuid,
    scope: AssignmentScope,
    scope_id: Option<Uuid>,
) -> Result<Option<StaffRoleAssignment>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, StaffRoleAssignment>(&format!(
        r#"
        SELECT {}
        FROM staff_role_assignments
        WHERE staff_id = $1 AND role_id = $2 AND scope_code = $3
          AND scope_id IS NOT DISTINCT FROM $4
        FOR UPDATE
        "#,
        ASSIGNMENT_COLUMNS
    ))
    .bind(staff_id)
    .bind(role_id)
    .bind(scope.as_str())
    .bind(scope_id)
    .fetch_optional(executor)
    .await
}

pub async fn insert_assignment<'e, E>(
    executor: E,
    assignment: &StaffRoleAssignment,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO staff_role_assignments
            (assignment_id, staff_id, role_id, scope_code, scope_id, conditions,
             assigned_by, assigned_utc, expires_utc, is_active, updated_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(assignment.assignment_id)
    .bind(assignment.staff_id)
    .bind(assignment.role_id)
    .bind(&assignment.scope_code)
    .bind(assignment.scope_id)
    .bind(&assignment.conditions)
    .bind(assignment.assigned_by)
    .bind(assignment.assigned_utc)
    .bind(assignment.expires_utc)
    .bind(assignment.is_active)
    .bind(assignment.updated_utc)
    .execute(executor)
    .await?;
    Ok(())
}

/// Write back the mutable columns of an assignment.
pub async fn save_assignment<'e, E>(
    executor: E,
    assignment: &StaffRoleAssignment,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE staff_role_assignments
        SET is_active = $2, conditions = $3, expires_utc = $4, assigned_by = $5,
            assigned_utc = $6, updated_utc = $7
        WHERE assignment_id = $1
        "#,
    )
    .bind(assignment.assignment_id)
    .bind(assignment.is_active)
    .bind(&assignment.conditions)
    .bind(assignment.expires_utc)
    .bind(assignment.assigned_by)
    .bind(assignment.assigned_utc)
    .bind(assignment.updated_utc)
    .execute(executor)
    .await?;
    Ok(())
}

/// Deactivate every active assignment of the role to the staff member.
pub async fn deactivate_for_pair<'e, E>(
    executor: E,
    staff_id: Uuid,
    role_id: Uuid,
) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE staff_role_assignments
        SET is_active = FALSE, updated_utc = NOW()
        WHERE staff_id = $1 AND role_id = $2 AND is_active
        "#,
    )
    .bind(staff_id)
    .bind(role_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Active assignments of a staff member with role and assigner detail, newest first.
pub async fn list_active_for_staff<'e, E>(
    executor: E,
    staff_id: Uuid,
) -> Result<Vec<AssignmentDetail>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AssignmentDetail>(
        r#"
        SELECT a.assignment_id, a.staff_id, s.user_id, a.role_id, r.role_name, r.role_code,
               a.scope_code, a.scope_id, a.conditions, a.assigned_by,
               au.display_name AS assigned_by_name,
               a.assigned_utc, a.expires_utc, a.is_active
        FROM staff_role_assignments a
        JOIN staff_members s ON s.staff_id = a.staff_id
        JOIN roles r ON r.role_id = a.role_id
        LEFT JOIN staff_members ab ON ab.staff_id = a.assigned_by
        LEFT JOIN users au ON au.user_id = ab.user_id
        WHERE a.staff_id = $1 AND a.is_active
        ORDER BY a.assigned_utc DESC
        "#,
    )
    .bind(staff_id)
    .fetch_all(executor)
    .await
}

pub async fn count_active_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM staff_role_assignments a
        JOIN staff_members s ON s.staff_id = a.staff_id
        WHERE s.user_id = $1 AND a.is_active
          AND (a.expires_utc IS NULL OR a.expires_utc > NOW())
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
}
