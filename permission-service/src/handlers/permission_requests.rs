//! Permission request workflow handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use service_core::error::AppError;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::requests::RequestFilter;
use crate::dtos::permission_requests::{
    CreatePermissionRequestBody, DecisionRequest, ListPermissionRequestsQuery,
};
use crate::dtos::MessageResponse;
use crate::middleware::{require_permission, AuthUser};
use crate::models::permission::{
    APPROVE_PERMISSION_REQUESTS, DELETE_PERMISSION_REQUESTS, MANAGE_PERMISSION_REQUESTS,
    VIEW_PERMISSION_REQUESTS,
};
use crate::models::PermissionRequestResponse;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpiredRequestsResponse {
    pub expired: usize,
    pub request_ids: Vec<Uuid>,
}

/// File a request for a permission, routed to named approvers
#[utoipa::path(
    post,
    path = "/permission-requests",
    request_body = CreatePermissionRequestBody,
    responses(
        (status = 201, description = "Request filed", body = PermissionRequestResponse),
        (status = 400, description = "Invalid approver list or expiry"),
        (status = 404, description = "Approver not found"),
        (status = 409, description = "Pending request or live grant already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn create_permission_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreatePermissionRequestBody>,
) -> Result<(StatusCode, Json<PermissionRequestResponse>), AppError> {
    req.validate()?;

    let request = state
        .permission_requests
        .create(user.user_id()?, req)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/permission-requests",
    params(ListPermissionRequestsQuery),
    responses((status = 200, description = "Requests, newest first", body = [PermissionRequestResponse])),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn list_permission_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListPermissionRequestsQuery>,
) -> Result<Json<Vec<PermissionRequestResponse>>, AppError> {
    require_permission(&state, &user, VIEW_PERMISSION_REQUESTS).await?;

    let requests = state
        .permission_requests
        .list(RequestFilter {
            status: query.status,
            requester_id: query.requester_id,
            approver_id: query.approver_id,
            awaiting_vote_only: false,
        })
        .await?;
    Ok(Json(requests))
}

/// Requests filed by the caller
#[utoipa::path(
    get,
    path = "/permission-requests/mine",
    responses((status = 200, description = "Caller's requests", body = [PermissionRequestResponse])),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn list_my_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<PermissionRequestResponse>>, AppError> {
    Ok(Json(
        state.permission_requests.list_mine(user.user_id()?).await?,
    ))
}

/// Pending requests still waiting on the caller's vote
#[utoipa::path(
    get,
    path = "/permission-requests/pending-approval",
    responses((status = 200, description = "Requests awaiting the caller", body = [PermissionRequestResponse])),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn list_pending_approval(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<PermissionRequestResponse>>, AppError> {
    Ok(Json(
        state
            .permission_requests
            .pending_approval(user.user_id()?)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/permission-requests/{id}",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request with approvers", body = PermissionRequestResponse),
        (status = 403, description = "Caller is not involved and lacks view_permission_requests"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn get_permission_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<PermissionRequestResponse>, AppError> {
    let viewer = user.user_id()?;
    let can_view_all = state
        .resolver
        .has_permission(viewer, VIEW_PERMISSION_REQUESTS)
        .await?;

    let request = state
        .permission_requests
        .get(request_id, viewer, can_view_all)
        .await?;
    Ok(Json(request))
}

/// Record the caller's approval. The last required approval issues the grant.
#[utoipa::path(
    post,
    path = "/permission-requests/{id}/approve",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Vote recorded", body = PermissionRequestResponse),
        (status = 403, description = "Caller is not an approver of this request"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request settled, expired, or already voted")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn approve_permission_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<PermissionRequestResponse>, AppError> {
    req.validate()?;
    require_permission(&state, &user, APPROVE_PERMISSION_REQUESTS).await?;

    let request = state
        .permission_requests
        .approve(request_id, user.user_id()?, req.comments)
        .await?;
    Ok(Json(request))
}

/// Record the caller's rejection. Any rejection settles the request.
#[utoipa::path(
    post,
    path = "/permission-requests/{id}/reject",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Vote recorded", body = PermissionRequestResponse),
        (status = 403, description = "Caller is not an approver of this request"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request settled, expired, or already voted")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn reject_permission_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<PermissionRequestResponse>, AppError> {
    req.validate()?;
    require_permission(&state, &user, APPROVE_PERMISSION_REQUESTS).await?;

    let request = state
        .permission_requests
        .reject(request_id, user.user_id()?, req.comments)
        .await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/permission-requests/{id}/cancel",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request cancelled", body = PermissionRequestResponse),
        (status = 403, description = "Caller is not the requester"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is no longer pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn cancel_permission_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<PermissionRequestResponse>, AppError> {
    let request = state
        .permission_requests
        .cancel(request_id, user.user_id()?)
        .await?;
    Ok(Json(request))
}

#[utoipa::path(
    delete,
    path = "/permission-requests/{id}",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request deleted", body = MessageResponse),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn delete_permission_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    require_permission(&state, &user, DELETE_PERMISSION_REQUESTS).await?;

    state.permission_requests.delete(request_id).await?;
    Ok(Json(MessageResponse::new("Permission request deleted")))
}

/// Expire pending requests past their deadline
#[utoipa::path(
    post,
    path = "/permission-requests/cleanup",
    responses((status = 200, description = "Sweep finished", body = ExpiredRequestsResponse)),
    security(("bearer_auth" = [])),
    tag = "Permission Requests"
)]
pub async fn cleanup_expired_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ExpiredRequestsResponse>, AppError> {
    require_permission(&state, &user, MANAGE_PERMISSION_REQUESTS).await?;

    let request_ids = state.permission_requests.cleanup_expired_requests().await?;
    Ok(Json(ExpiredRequestsResponse {
        expired: request_ids.len(),
        request_ids,
    }))
}
