use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::PermissionAuditEntry;

pub async fn insert_entry<'e, E>(executor: E, entry: &PermissionAuditEntry) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO permission_audit_entries
            (audit_id, temp_permission_id, action_code, performed_by, reason, metadata, created_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.audit_id)
    .bind(entry.temp_permission_id)
    .bind(&entry.action_code)
    .bind(entry.performed_by)
    .bind(&entry.reason)
    .bind(&entry.metadata)
    .bind(entry.created_utc)
    .execute(executor)
    .await?;
    Ok(())
}

/// Audit trail of a grant, oldest first.
pub async fn list_for_grant<'e, E>(
    executor: E,
    temp_permission_id: Uuid,
) -> Result<Vec<PermissionAuditEntry>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PermissionAuditEntry>(
        r#"
        SELECT audit_id, temp_permission_id, action_code, performed_by, reason, metadata, created_utc
        FROM permission_audit_entries
        WHERE temp_permission_id = $1
        ORDER BY created_utc ASC, audit_id
        "#,
    )
    .bind(temp_permission_id)
    .fetch_all(executor)
    .await
}
