//! Permission request workflow.
//!
//! A request is routed to approvers. Every vote re-evaluates the aggregate
//! status with [`next_request_status`]; on approval the temporary grant is
//! issued in the same transaction as the deciding vote.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::db;
use crate::db::requests::RequestFilter;
use crate::dtos::permission_requests::CreatePermissionRequestBody;
use crate::models::permission::{normalize_permission, APPROVE_PERMISSION_REQUESTS};
use crate::models::{
    next_request_status, ApproverStatus, PermissionApprover, PermissionRequest,
    PermissionRequestResponse, RequestStatus,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::metrics;
use crate::services::resolution::load_sources;
use crate::services::temporary_permission::{issue_grant_in, NewGrant};

/// Deduplicate approver ids keeping their first position.
pub fn dedupe_approvers(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

#[derive(Clone)]
pub struct PermissionRequestService {
    pool: PgPool,
    default_grant_window: Duration,
}

impl PermissionRequestService {
    pub fn new(pool: PgPool, default_grant_hours: i64) -> Self {
        Self {
            pool,
            default_grant_window: Duration::hours(default_grant_hours),
        }
    }

    #[instrument(skip(self, req), fields(permission = %req.permission))]
    pub async fn create(
        &self,
        requester_id: Uuid,
        req: CreatePermissionRequestBody,
    ) -> ServiceResult<PermissionRequestResponse> {
        let permission = normalize_permission(&req.permission)
            .ok_or_else(|| ServiceError::Validation("Permission name must not be blank".into()))?;
        let approver_ids = dedupe_approvers(&req.approver_ids);
        if approver_ids.is_empty() {
            return Err(ServiceError::Validation("At least one approver is required".into()));
        }
        if approver_ids.contains(&requester_id) {
            return Err(ServiceError::Validation("Requesters cannot approve their own request".into()));
        }
        if req.expires_utc.is_some_and(|exp| exp <= Utc::now()) {
            return Err(ServiceError::Validation("expires_utc must be in the future".into()));
        }

        let mut tx = self.pool.begin().await?;

        if !db::users::user_exists(&mut *tx, requester_id).await? {
            return Err(ServiceError::not_found("User", requester_id));
        }
        if db::requests::has_pending_request(&mut *tx, requester_id, &permission).await? {
            return Err(ServiceError::Conflict(format!(
                "A pending request for '{}' already exists",
                permission
            )));
        }
        if db::temporary_permissions::has_live_grant(&mut *tx, requester_id, &permission).await? {
            return Err(ServiceError::Conflict(format!(
                "An active temporary grant of '{}' already exists",
                permission
            )));
        }

        for approver_id in &approver_ids {
            if !db::users::user_exists(&mut *tx, *approver_id).await? {
                return Err(ServiceError::not_found("Approver", approver_id));
            }
            if db::staff::find_staff_by_user(&mut *tx, *approver_id).await?.is_none() {
                return Err(ServiceError::Validation(format!(
                    "Approver {} is not a staff member",
                    approver_id
                )));
            }
            let effective = load_sources(&mut tx, *approver_id).await?.effective();
            if !effective.contains(APPROVE_PERMISSION_REQUESTS) {
                return Err(ServiceError::Validation(format!(
                    "User {} cannot approve permission requests",
                    approver_id
                )));
            }
        }

        let request = PermissionRequest::new(
            requester_id,
            permission,
            req.reason,
            req.urgency,
            req.expires_utc,
        );
        db::requests::insert_request(&mut *tx, &request).await?;

        let mut approvers = Vec::with_capacity(approver_ids.len());
        for (position, user_id) in approver_ids.into_iter().enumerate() {
            let approver = PermissionApprover::new(request.request_id, user_id, position as i32);
            db::requests::insert_approver(&mut *tx, &approver).await?;
            approvers.push(approver);
        }

        tx.commit().await?;

        tracing::info!(
            request_id = %request.request_id,
            requester_id = %requester_id,
            approvers = approvers.len(),
            "Permission request created"
        );
        Ok(PermissionRequestResponse::new(request, approvers))
    }

    /// Record one approver's decision and settle the request.
    #[instrument(skip(self, comments))]
    pub async fn decide(
        &self,
        request_id: Uuid,
        approver_user_id: Uuid,
        vote: ApproverStatus,
        comments: Option<String>,
    ) -> ServiceResult<PermissionRequestResponse> {
        let mut tx = self.pool.begin().await?;

        let mut request = db::requests::lock_request(&mut *tx, request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Permission request", request_id))?;

        let now = Utc::now();
        let current = request.status();
        if current.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Request is already {}",
                current.as_str()
            )));
        }
        if request.is_past_expiry_at(now) {
            return Err(ServiceError::Conflict("Request has expired".into()));
        }

        let mut approvers = db::requests::list_approvers(&mut *tx, request_id).await?;
        let approver = approvers
            .iter_mut()
            .find(|a| a.user_id == approver_user_id)
            .ok_or_else(|| ServiceError::Forbidden("You are not an approver of this request".into()))?;

        let decided = approver.status().cast(vote).map_err(ServiceError::Conflict)?;
        approver.status_code = decided.as_str().to_string();
        approver.comments = comments;
        approver.decided_utc = Some(now);
        db::requests::save_approver(&mut *tx, approver).await?;

        let votes: Vec<_> = approvers.iter().map(PermissionApprover::vote).collect();
        let next = next_request_status(current, &votes);

        match next {
            RequestStatus::Approved => {
                let granting_staff = db::staff::find_staff_by_user(&mut *tx, approver_user_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::Forbidden("Only staff members can approve requests".into())
                    })?;
                let grant = issue_grant_in(
                    &mut tx,
                    NewGrant {
                        user_id: request.requester_id,
                        permission: request.permission.clone(),
                        expires_utc: request
                            .expires_utc
                            .unwrap_or(now + self.default_grant_window),
                        reason: format!("Approved request: {}", request.reason),
                        granted_by: granting_staff.staff_id,
                        source_request_id: Some(request.request_id),
                    },
                )
                .await?;
                request.granted_temp_permission_id = Some(grant.temp_permission_id);
                request.decided_utc = Some(now);
            }
            RequestStatus::Rejected => {
                request.decided_utc = Some(now);
            }
            _ => {}
        }

        request.status_code = next.as_str().to_string();
        request.updated_utc = now;
        db::requests::save_request_outcome(&mut *tx, &request).await?;
        tx.commit().await?;

        tracing::info!(
            request_id = %request_id,
            approver_user_id = %approver_user_id,
            vote = vote.as_str(),
            status = next.as_str(),
            "Approver decision recorded"
        );
        Ok(PermissionRequestResponse::new(request, approvers))
    }

    pub async fn approve(
        &self,
        request_id: Uuid,
        approver_user_id: Uuid,
        comments: Option<String>,
    ) -> ServiceResult<PermissionRequestResponse> {
        self.decide(request_id, approver_user_id, ApproverStatus::Approved, comments)
            .await
    }

    pub async fn reject(
        &self,
        request_id: Uuid,
        approver_user_id: Uuid,
        comments: Option<String>,
    ) -> ServiceResult<PermissionRequestResponse> {
        self.decide(request_id, approver_user_id, ApproverStatus::Rejected, comments)
            .await
    }

    /// Only the requester, only while pending.
    #[instrument(skip(self))]
    pub async fn cancel(&self, request_id: Uuid, requester_id: Uuid) -> ServiceResult<PermissionRequestResponse> {
        let mut tx = self.pool.begin().await?;
        let mut request = db::requests::lock_request(&mut *tx, request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Permission request", request_id))?;

        if request.requester_id != requester_id {
            return Err(ServiceError::Forbidden("Only the requester can cancel a request".into()));
        }
        let status = request.status();
        if status != RequestStatus::Pending {
            return Err(ServiceError::Conflict(format!("Request is already {}", status.as_str())));
        }

        let now = Utc::now();
        request.status_code = RequestStatus::Cancelled.as_str().to_string();
        request.decided_utc = Some(now);
        request.updated_utc = now;
        db::requests::save_request_outcome(&mut *tx, &request).await?;
        let approvers = db::requests::list_approvers(&mut *tx, request_id).await?;
        tx.commit().await?;

        tracing::info!(request_id = %request_id, "Permission request cancelled");
        Ok(PermissionRequestResponse::new(request, approvers))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, request_id: Uuid) -> ServiceResult<()> {
        if !db::requests::delete_request(&self.pool, request_id).await? {
            return Err(ServiceError::not_found("Permission request", request_id));
        }
        tracing::info!(request_id = %request_id, "Permission request deleted");
        Ok(())
    }

    /// Expire pending requests whose deadline has passed.
    #[instrument(skip(self))]
    pub async fn cleanup_expired_requests(&self) -> ServiceResult<Vec<Uuid>> {
        let expired = db::requests::expire_pending(&self.pool).await?;
        metrics::record_cleanup("permission_requests", expired.len() as u64);
        if !expired.is_empty() {
            tracing::info!(expired = expired.len(), "Expired pending permission requests");
        }
        Ok(expired)
    }

    /// Fetch one request. Visible to the requester, any assigned approver,
    /// or callers allowed to view every request.
    pub async fn get(
        &self,
        request_id: Uuid,
        viewer_id: Uuid,
        can_view_all: bool,
    ) -> ServiceResult<PermissionRequestResponse> {
        let request = db::requests::find_request(&self.pool, request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Permission request", request_id))?;
        let approvers = db::requests::list_approvers(&self.pool, request_id).await?;

        let involved = request.requester_id == viewer_id || approvers.iter().any(|a| a.user_id == viewer_id);
        if !involved && !can_view_all {
            return Err(ServiceError::Forbidden("Not allowed to view this request".into()));
        }
        Ok(PermissionRequestResponse::new(request, approvers))
    }

    pub async fn list(&self, filter: RequestFilter) -> ServiceResult<Vec<PermissionRequestResponse>> {
        let requests = db::requests::list_requests(&self.pool, &filter).await?;
        let ids: Vec<Uuid> = requests.iter().map(|r| r.request_id).collect();

        let mut by_request: HashMap<Uuid, Vec<PermissionApprover>> = HashMap::new();
        for approver in db::requests::list_approvers_for(&self.pool, &ids).await? {
            by_request.entry(approver.request_id).or_default().push(approver);
        }

        Ok(requests
            .into_iter()
            .map(|r| {
                let approvers = by_request.remove(&r.request_id).unwrap_or_default();
                PermissionRequestResponse::new(r, approvers)
            })
            .collect())
    }

    pub async fn list_mine(&self, requester_id: Uuid) -> ServiceResult<Vec<PermissionRequestResponse>> {
        self.list(RequestFilter {
            requester_id: Some(requester_id),
            ..Default::default()
        })
        .await
    }

    /// Pending requests still waiting on this approver's vote.
    pub async fn pending_approval(&self, approver_id: Uuid) -> ServiceResult<Vec<PermissionRequestResponse>> {
        self.list(RequestFilter {
            status: Some(RequestStatus::Pending),
            approver_id: Some(approver_id),
            awaiting_vote_only: true,
            ..Default::default()
        })
        .await
    }
}
