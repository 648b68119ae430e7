//! Temporary permission ledger handlers.
//!
//! Issue, extend, revoke, update and delete check the acting staff member's
//! permissions inside the service transaction; read endpoints are guarded here.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::db::temporary_permissions::GrantFilter;
use crate::dtos::temporary_permissions::{
    CreateTemporaryPermissionRequest, ExpiringQuery, ExtendTemporaryPermissionRequest,
    ListTemporaryPermissionsQuery, RevokeTemporaryPermissionRequest,
    UpdateTemporaryPermissionRequest,
};
use crate::dtos::MessageResponse;
use crate::middleware::{require_permission, AuthUser};
use crate::models::permission::{MANAGE_TEMPORARY_PERMISSIONS, VIEW_TEMPORARY_PERMISSIONS};
use crate::models::{AuditEntryResponse, TemporaryPermission, TemporaryPermissionResponse};
use crate::services::temporary_permission::CleanupSummary;
use crate::AppState;

fn responses(rows: Vec<TemporaryPermission>) -> Vec<TemporaryPermissionResponse> {
    rows.into_iter().map(TemporaryPermissionResponse::from).collect()
}

/// Grant a permission until a fixed expiry
#[utoipa::path(
    post,
    path = "/temporary-permissions",
    request_body = CreateTemporaryPermissionRequest,
    responses(
        (status = 201, description = "Grant issued", body = TemporaryPermissionResponse),
        (status = 400, description = "Expiry not in the future"),
        (status = 403, description = "Caller lacks grant_temporary_permissions"),
        (status = 409, description = "A live grant already exists for this user and permission")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn create_temporary_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTemporaryPermissionRequest>,
) -> Result<(StatusCode, Json<TemporaryPermissionResponse>), AppError> {
    req.validate()?;

    let grant = state
        .temporary_permissions
        .create(user.user_id()?, req)
        .await?;
    Ok((StatusCode::CREATED, Json(grant.into())))
}

#[utoipa::path(
    get,
    path = "/temporary-permissions",
    params(ListTemporaryPermissionsQuery),
    responses((status = 200, description = "Grants, newest first", body = [TemporaryPermissionResponse])),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn list_temporary_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListTemporaryPermissionsQuery>,
) -> Result<Json<Vec<TemporaryPermissionResponse>>, AppError> {
    require_permission(&state, &user, VIEW_TEMPORARY_PERMISSIONS).await?;

    let grants = state
        .temporary_permissions
        .list(GrantFilter {
            user_id: query.user_id,
            permission: query.permission,
            active_only: query.active_only,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;
    Ok(Json(responses(grants)))
}

/// Grants held by one user. Users may always read their own.
#[utoipa::path(
    get,
    path = "/temporary-permissions/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Grantee user id")),
    responses((status = 200, description = "Grants", body = [TemporaryPermissionResponse])),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn list_user_temporary_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<TemporaryPermissionResponse>>, AppError> {
    if user.user_id()? != user_id {
        require_permission(&state, &user, VIEW_TEMPORARY_PERMISSIONS).await?;
    }

    let grants = state.temporary_permissions.list_for_user(user_id).await?;
    Ok(Json(responses(grants)))
}

#[utoipa::path(
    get,
    path = "/temporary-permissions/expiring",
    params(ExpiringQuery),
    responses(
        (status = 200, description = "Live grants expiring soon", body = [TemporaryPermissionResponse]),
        (status = 422, description = "within_hours outside 0..=8760")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn list_expiring_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ExpiringQuery>,
) -> Result<Json<Vec<TemporaryPermissionResponse>>, AppError> {
    query.validate()?;
    require_permission(&state, &user, VIEW_TEMPORARY_PERMISSIONS).await?;

    let within = query
        .within_hours
        .unwrap_or(state.config.grants.expiring_soon_hours);
    let grants = state.temporary_permissions.expiring(within).await?;
    Ok(Json(responses(grants)))
}

#[utoipa::path(
    get,
    path = "/temporary-permissions/{id}",
    params(("id" = Uuid, Path, description = "Grant id")),
    responses(
        (status = 200, description = "Grant", body = TemporaryPermissionResponse),
        (status = 404, description = "Grant not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn get_temporary_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TemporaryPermissionResponse>, AppError> {
    let grant = state.temporary_permissions.get(id).await?;
    if grant.user_id != user.user_id()? {
        require_permission(&state, &user, VIEW_TEMPORARY_PERMISSIONS).await?;
    }
    Ok(Json(grant.into()))
}

/// Audit trail of a grant, oldest first
#[utoipa::path(
    get,
    path = "/temporary-permissions/{id}/audit",
    params(("id" = Uuid, Path, description = "Grant id")),
    responses(
        (status = 200, description = "Audit entries", body = [AuditEntryResponse]),
        (status = 404, description = "Grant not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn get_audit_trail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEntryResponse>>, AppError> {
    require_permission(&state, &user, VIEW_TEMPORARY_PERMISSIONS).await?;

    let entries = state.temporary_permissions.audit_trail(id).await?;
    Ok(Json(entries.into_iter().map(AuditEntryResponse::from).collect()))
}

#[utoipa::path(
    patch,
    path = "/temporary-permissions/{id}/extend",
    params(("id" = Uuid, Path, description = "Grant id")),
    request_body = ExtendTemporaryPermissionRequest,
    responses(
        (status = 200, description = "Grant extended", body = TemporaryPermissionResponse),
        (status = 403, description = "Caller lacks manage_temporary_permissions"),
        (status = 404, description = "Grant not found"),
        (status = 409, description = "Grant not live or new expiry not later")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn extend_temporary_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ExtendTemporaryPermissionRequest>,
) -> Result<Json<TemporaryPermissionResponse>, AppError> {
    req.validate()?;

    let grant = state
        .temporary_permissions
        .extend(user.user_id()?, id, req)
        .await?;
    Ok(Json(grant.into()))
}

#[utoipa::path(
    patch,
    path = "/temporary-permissions/{id}/revoke",
    params(("id" = Uuid, Path, description = "Grant id")),
    request_body = RevokeTemporaryPermissionRequest,
    responses(
        (status = 200, description = "Grant revoked", body = TemporaryPermissionResponse),
        (status = 403, description = "Caller lacks manage_temporary_permissions"),
        (status = 404, description = "Grant not found"),
        (status = 409, description = "Grant already inactive")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn revoke_temporary_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RevokeTemporaryPermissionRequest>,
) -> Result<Json<TemporaryPermissionResponse>, AppError> {
    req.validate()?;

    let grant = state
        .temporary_permissions
        .revoke(user.user_id()?, id, req)
        .await?;
    Ok(Json(grant.into()))
}

/// Administrative edit of expiry, reason or active flag
#[utoipa::path(
    patch,
    path = "/temporary-permissions/{id}",
    params(("id" = Uuid, Path, description = "Grant id")),
    request_body = UpdateTemporaryPermissionRequest,
    responses(
        (status = 200, description = "Grant updated", body = TemporaryPermissionResponse),
        (status = 403, description = "Caller lacks manage_temporary_permissions"),
        (status = 404, description = "Grant not found"),
        (status = 409, description = "Change would shorten the grant or duplicate a live grant")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn update_temporary_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTemporaryPermissionRequest>,
) -> Result<Json<TemporaryPermissionResponse>, AppError> {
    req.validate()?;

    let grant = state
        .temporary_permissions
        .update(user.user_id()?, id, req)
        .await?;
    Ok(Json(grant.into()))
}

#[utoipa::path(
    delete,
    path = "/temporary-permissions/{id}",
    params(("id" = Uuid, Path, description = "Grant id")),
    responses(
        (status = 200, description = "Grant and its audit trail deleted", body = MessageResponse),
        (status = 403, description = "Caller lacks manage_temporary_permissions"),
        (status = 404, description = "Grant not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn delete_temporary_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .temporary_permissions
        .delete(user.user_id()?, id)
        .await?;
    Ok(Json(MessageResponse::new("Temporary permission deleted")))
}

/// Deactivate every live-flagged grant whose expiry has passed
#[utoipa::path(
    post,
    path = "/temporary-permissions/cleanup",
    responses(
        (status = 200, description = "Sweep finished", body = CleanupSummary),
        (status = 403, description = "Caller lacks manage_temporary_permissions")
    ),
    security(("bearer_auth" = [])),
    tag = "Temporary Permissions"
)]
pub async fn cleanup_expired_permissions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CleanupSummary>, AppError> {
    require_permission(&state, &user, MANAGE_TEMPORARY_PERMISSIONS).await?;

    Ok(Json(
        state.temporary_permissions.cleanup_expired_permissions().await?,
    ))
}
