//! Read-only aggregation queries backing the analytics endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct SystemTotals {
    pub total_users: i64,
    pub total_staff: i64,
    pub active_roles: i64,
    pub active_assignments: i64,
    pub live_temporary_grants: i64,
    pub pending_requests: i64,
}

/// Distinct users holding a permission through any source.
#[derive(Debug, Clone, FromRow)]
pub struct PermissionHolders {
    pub permission: String,
    pub holder_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PermissionGrantCount {
    pub permission: String,
    pub grant_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DepartmentUsage {
    pub department_id: Uuid,
    pub department_label: String,
    pub staff_count: i64,
    pub active_assignments: i64,
    pub live_temporary_grants: i64,
    pub distinct_role_permissions: i64,
}

pub async fn system_totals<'e, E>(executor: E) -> Result<SystemTotals, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, SystemTotals>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS total_users,
            (SELECT COUNT(*) FROM staff_members WHERE is_active) AS total_staff,
            (SELECT COUNT(*) FROM roles WHERE is_active) AS active_roles,
            (SELECT COUNT(*) FROM staff_role_assignments
              WHERE is_active AND (expires_utc IS NULL OR expires_utc > NOW())) AS active_assignments,
            (SELECT COUNT(*) FROM temporary_permissions
              WHERE is_active AND expires_utc > NOW()) AS live_temporary_grants,
            (SELECT COUNT(*) FROM permission_requests WHERE status_code = 'pending') AS pending_requests
        "#,
    )
    .fetch_one(executor)
    .await
}

pub async fn permission_holders<'e, E>(executor: E) -> Result<Vec<PermissionHolders>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PermissionHolders>(
        r#"
        WITH holdings AS (
            SELECT s.user_id, unnest(r.permissions) AS permission
            FROM staff_role_assignments a
            JOIN staff_members s ON s.staff_id = a.staff_id
            JOIN roles r ON r.role_id = a.role_id
            WHERE a.is_active AND r.is_active
              AND (a.expires_utc IS NULL OR a.expires_utc > NOW())
            UNION
            SELECT user_id, unnest(direct_permissions) FROM users
            UNION
            SELECT user_id, permission FROM temporary_permissions
            WHERE is_active AND expires_utc > NOW()
        )
        SELECT permission, COUNT(DISTINCT user_id) AS holder_count
        FROM holdings
        GROUP BY permission
        ORDER BY permission
        "#,
    )
    .fetch_all(executor)
    .await
}

/// Every permission named by at least one active role.
pub async fn role_defined_permissions<'e, E>(executor: E) -> Result<Vec<String>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT unnest(permissions) FROM roles WHERE is_active ORDER BY 1",
    )
    .fetch_all(executor)
    .await
}

/// Temporary grants issued since `since`, per permission.
pub async fn temporary_grant_counts<'e, E>(
    executor: E,
    since: DateTime<Utc>,
) -> Result<Vec<PermissionGrantCount>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PermissionGrantCount>(
        r#"
        SELECT permission, COUNT(*) AS grant_count
        FROM temporary_permissions
        WHERE granted_utc >= $1
        GROUP BY permission
        ORDER BY grant_count DESC, permission
        "#,
    )
    .bind(since)
    .fetch_all(executor)
    .await
}

pub async fn department_usage<'e, E>(executor: E) -> Result<Vec<DepartmentUsage>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, DepartmentUsage>(
        r#"
        SELECT d.department_id, d.department_label,
               COUNT(DISTINCT s.staff_id) AS staff_count,
               COUNT(DISTINCT a.assignment_id) AS active_assignments,
               COUNT(DISTINCT t.temp_permission_id) AS live_temporary_grants,
               (SELECT COUNT(DISTINCT p)
                  FROM staff_role_assignments a2
                  JOIN staff_members s2 ON s2.staff_id = a2.staff_id
                  JOIN roles r2 ON r2.role_id = a2.role_id,
                  unnest(r2.permissions) AS p
                 WHERE s2.department_id = d.department_id
                   AND a2.is_active AND r2.is_active
                   AND (a2.expires_utc IS NULL OR a2.expires_utc > NOW())
               ) AS distinct_role_permissions
        FROM departments d
        LEFT JOIN staff_members s ON s.department_id = d.department_id
        LEFT JOIN staff_role_assignments a
               ON a.staff_id = s.staff_id AND a.is_active
              AND (a.expires_utc IS NULL OR a.expires_utc > NOW())
        LEFT JOIN temporary_permissions t
               ON t.user_id = s.user_id AND t.is_active AND t.expires_utc > NOW()
        GROUP BY d.department_id, d.department_label
        ORDER BY d.department_label
        "#,
    )
    .fetch_all(executor)
    .await
}
