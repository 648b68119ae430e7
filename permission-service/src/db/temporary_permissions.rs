use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::TemporaryPermission;

const GRANT_COLUMNS: &str = "temp_permission_id, user_id, permission, granted_by, granted_utc, \
    expires_utc, reason, is_active, source_request_id, updated_utc";

/// Filters for grant listings.
#[derive(Debug, Clone, Default)]
pub struct GrantFilter {
    pub user_id: Option<Uuid>,
    pub permission: Option<String>,
    pub active_only: bool,
    pub limit: i64,
    pub offset: i64,
}

pub async fn insert_grant<'e, E>(executor: E, grant: &TemporaryPermission) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO temporary_permissions
            (temp_permission_id, user_id, permission, granted_by, granted_utc, expires_utc,
             reason, is_active, source_request_id, updated_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(grant.temp_permission_id)
    .bind(grant.user_id)
    .bind(&grant.permission)
    .bind(grant.granted_by)
    .bind(grant.granted_utc)
    .bind(grant.expires_utc)
    .bind(&grant.reason)
    .bind(grant.is_active)
    .bind(grant.source_request_id)
    .bind(grant.updated_utc)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_grant<'e, E>(
    executor: E,
    temp_permission_id: Uuid,
) -> Result<Option<TemporaryPermission>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, TemporaryPermission>(&format!(
        "SELECT {} FROM temporary_permissions WHERE temp_permission_id = $1",
        GRANT_COLUMNS
    ))
    .bind(temp_permission_id)
    .fetch_optional(executor)
    .await
}

pub async fn lock_grant<'e, E>(
    executor: E,
    temp_permission_id: Uuid,
) -> Result<Option<TemporaryPermission>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, TemporaryPermission>(&format!(
        "SELECT {} FROM temporary_permissions WHERE temp_permission_id = $1 FOR UPDATE",
        GRANT_COLUMNS
    ))
    .bind(temp_permission_id)
    .fetch_optional(executor)
    .await
}

/// The active-flagged grant for (user, permission), live or awaiting sweep.
pub async fn lock_active_grant<'e, E>(
    executor: E,
    user_id: Uuid,
    permission: &str,
) -> Result<Option<TemporaryPermission>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, TemporaryPermission>(&format!(
        r#"
        SELECT {}
        FROM temporary_permissions
        WHERE user_id = $1 AND permission = $2 AND is_active
        FOR UPDATE
        "#,
        GRANT_COLUMNS
    ))
    .bind(user_id)
    .bind(permission)
    .fetch_optional(executor)
    .await
}

pub async fn has_live_grant<'e, E>(
    executor: E,
    user_id: Uuid,
    permission: &str,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM temporary_permissions
            WHERE user_id = $1 AND permission = $2 AND is_active AND expires_utc > NOW()
        )
        "#,
    )
    .bind(user_id)
    .bind(permission)
    .fetch_one(executor)
    .await
}

/// Write back every mutable column of a grant.
pub async fn save_grant<'e, E>(executor: E, grant: &TemporaryPermission) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE temporary_permissions
        SET expires_utc = $2, reason = $3, is_active = $4, updated_utc = $5
        WHERE temp_permission_id = $1
        "#,
    )
    .bind(grant.temp_permission_id)
    .bind(grant.expires_utc)
    .bind(&grant.reason)
    .bind(grant.is_active)
    .bind(grant.updated_utc)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete_grant<'e, E>(executor: E, temp_permission_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM temporary_permissions WHERE temp_permission_id = $1")
        .bind(temp_permission_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_grants<'e, E>(
    executor: E,
    filter: &GrantFilter,
) -> Result<Vec<TemporaryPermission>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, TemporaryPermission>(&format!(
        r#"
        SELECT {}
        FROM temporary_permissions
        WHERE ($1::uuid IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR permission = $2)
          AND ($3 = FALSE OR (is_active AND expires_utc > NOW()))
        ORDER BY granted_utc DESC
        LIMIT $4 OFFSET $5
        "#,
        GRANT_COLUMNS
    ))
    .bind(filter.user_id)
    .bind(filter.permission.as_deref())
    .bind(filter.active_only)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(executor)
    .await
}

/// Live grants that expire before `until`, soonest first.
pub async fn list_expiring<'e, E>(
    executor: E,
    until: DateTime<Utc>,
) -> Result<Vec<TemporaryPermission>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, TemporaryPermission>(&format!(
        r#"
        SELECT {}
        FROM temporary_permissions
        WHERE is_active AND expires_utc > NOW() AND expires_utc <= $1
        ORDER BY expires_utc ASC
        "#,
        GRANT_COLUMNS
    ))
    .bind(until)
    .fetch_all(executor)
    .await
}

/// Active-flagged grants whose expiry has passed. Rows held by another
/// sweep are skipped.
pub async fn lock_expired_active<'e, E>(executor: E) -> Result<Vec<TemporaryPermission>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, TemporaryPermission>(&format!(
        r#"
        SELECT {}
        FROM temporary_permissions
        WHERE is_active AND expires_utc <= NOW()
        ORDER BY expires_utc ASC
        FOR UPDATE SKIP LOCKED
        "#,
        GRANT_COLUMNS
    ))
    .fetch_all(executor)
    .await
}

/// Permission names of the user's live grants.
pub async fn live_permissions_for_user<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Vec<String>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT DISTINCT permission
        FROM temporary_permissions
        WHERE user_id = $1 AND is_active AND expires_utc > NOW()
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn count_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM temporary_permissions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
}
