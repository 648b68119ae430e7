use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{PermissionApprover, PermissionRequest, RequestStatus};

const REQUEST_COLUMNS: &str = "request_id, requester_id, permission, reason, urgency_code, \
    status_code, requested_utc, expires_utc, decided_utc, granted_temp_permission_id, updated_utc";

const APPROVER_COLUMNS: &str =
    "approver_id, request_id, user_id, role_code, status_code, is_required, comments, decided_utc, position";

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub requester_id: Option<Uuid>,
    pub approver_id: Option<Uuid>,
    /// Only requests where this approver has not voted yet.
    pub awaiting_vote_only: bool,
}

pub async fn insert_request<'e, E>(executor: E, request: &PermissionRequest) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO permission_requests
            (request_id, requester_id, permission, reason, urgency_code, status_code,
             requested_utc, expires_utc, decided_utc, granted_temp_permission_id, updated_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(request.request_id)
    .bind(request.requester_id)
    .bind(&request.permission)
    .bind(&request.reason)
    .bind(&request.urgency_code)
    .bind(&request.status_code)
    .bind(request.requested_utc)
    .bind(request.expires_utc)
    .bind(request.decided_utc)
    .bind(request.granted_temp_permission_id)
    .bind(request.updated_utc)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn insert_approver<'e, E>(executor: E, approver: &PermissionApprover) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO permission_approvers
            (approver_id, request_id, user_id, role_code, status_code, is_required, comments, decided_utc, position)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(approver.approver_id)
    .bind(approver.request_id)
    .bind(approver.user_id)
    .bind(&approver.role_code)
    .bind(&approver.status_code)
    .bind(approver.is_required)
    .bind(&approver.comments)
    .bind(approver.decided_utc)
    .bind(approver.position)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_request<'e, E>(
    executor: E,
    request_id: Uuid,
) -> Result<Option<PermissionRequest>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PermissionRequest>(&format!(
        "SELECT {} FROM permission_requests WHERE request_id = $1",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(executor)
    .await
}

pub async fn lock_request<'e, E>(
    executor: E,
    request_id: Uuid,
) -> Result<Option<PermissionRequest>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PermissionRequest>(&format!(
        "SELECT {} FROM permission_requests WHERE request_id = $1 FOR UPDATE",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(executor)
    .await
}

/// Approvers of one request in their original order.
pub async fn list_approvers<'e, E>(
    executor: E,
    request_id: Uuid,
) -> Result<Vec<PermissionApprover>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PermissionApprover>(&format!(
        "SELECT {} FROM permission_approvers WHERE request_id = $1 ORDER BY position",
        APPROVER_COLUMNS
    ))
    .bind(request_id)
    .fetch_all(executor)
    .await
}

/// Approvers of many requests, grouped by request then position.
pub async fn list_approvers_for<'e, E>(
    executor: E,
    request_ids: &[Uuid],
) -> Result<Vec<PermissionApprover>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PermissionApprover>(&format!(
        "SELECT {} FROM permission_approvers WHERE request_id = ANY($1) ORDER BY request_id, position",
        APPROVER_COLUMNS
    ))
    .bind(request_ids)
    .fetch_all(executor)
    .await
}

pub async fn save_approver<'e, E>(executor: E, approver: &PermissionApprover) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE permission_approvers
        SET status_code = $2, comments = $3, decided_utc = $4
        WHERE approver_id = $1
        "#,
    )
    .bind(approver.approver_id)
    .bind(&approver.status_code)
    .bind(&approver.comments)
    .bind(approver.decided_utc)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn save_request_outcome<'e, E>(
    executor: E,
    request: &PermissionRequest,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE permission_requests
        SET status_code = $2, decided_utc = $3, granted_temp_permission_id = $4, updated_utc = $5
        WHERE request_id = $1
        "#,
    )
    .bind(request.request_id)
    .bind(&request.status_code)
    .bind(request.decided_utc)
    .bind(request.granted_temp_permission_id)
    .bind(request.updated_utc)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn has_pending_request<'e, E>(
    executor: E,
    requester_id: Uuid,
    permission: &str,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM permission_requests
            WHERE requester_id = $1 AND permission = $2 AND status_code = 'pending'
        )
        "#,
    )
    .bind(requester_id)
    .bind(permission)
    .fetch_one(executor)
    .await
}

pub async fn list_requests<'e, E>(
    executor: E,
    filter: &RequestFilter,
) -> Result<Vec<PermissionRequest>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PermissionRequest>(&format!(
        r#"
        SELECT {}
        FROM permission_requests r
        WHERE ($1::text IS NULL OR r.status_code = $1)
          AND ($2::uuid IS NULL OR r.requester_id = $2)
          AND ($3::uuid IS NULL OR EXISTS (
                SELECT 1 FROM permission_approvers pa
                WHERE pa.request_id = r.request_id AND pa.user_id = $3
                  AND ($4 = FALSE OR pa.status_code = 'pending')
          ))
        ORDER BY r.requested_utc DESC
        "#,
        REQUEST_COLUMNS
    ))
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.requester_id)
    .bind(filter.approver_id)
    .bind(filter.awaiting_vote_only)
    .fetch_all(executor)
    .await
}

pub async fn delete_request<'e, E>(executor: E, request_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM permission_requests WHERE request_id = $1")
        .bind(request_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Flip pending requests past their expiry to expired. Returns the ids.
pub async fn expire_pending<'e, E>(executor: E) -> Result<Vec<Uuid>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE permission_requests
        SET status_code = 'expired', decided_utc = NOW(), updated_utc = NOW()
        WHERE status_code = 'pending' AND expires_utc IS NOT NULL AND expires_utc <= NOW()
        RETURNING request_id
        "#,
    )
    .fetch_all(executor)
    .await
}

pub async fn count_pending<'e, E>(executor: E, requester_id: Option<Uuid>) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM permission_requests
        WHERE status_code = 'pending' AND ($1::uuid IS NULL OR requester_id = $1)
        "#,
    )
    .bind(requester_id)
    .fetch_one(executor)
    .await
}
