//! Effective permission reads and direct override management.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::users::{
    AddPermissionRequest, CheckMode, CheckPermissionsQuery, PermissionCheckResponse,
    UserPermissionsResponse,
};
use crate::middleware::{require_permission, AuthUser};
use crate::models::permission::{MANAGE_USER_PERMISSIONS, VIEW_USER_PERMISSIONS};
use crate::AppState;

/// The caller's own effective permissions
#[utoipa::path(
    get,
    path = "/users/me/permissions",
    responses((status = 200, description = "Effective permissions", body = UserPermissionsResponse)),
    security(("bearer_auth" = [])),
    tag = "User Permissions"
)]
pub async fn get_my_permissions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserPermissionsResponse>, AppError> {
    let user_id = user.user_id()?;
    let effective = state.resolver.get_user_permissions(user_id).await?;
    Ok(Json(UserPermissionsResponse::new(user_id, &effective)))
}

/// Effective permissions of any user. Unknown users resolve to an empty set.
#[utoipa::path(
    get,
    path = "/users/{id}/permissions",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Effective permissions", body = UserPermissionsResponse)),
    security(("bearer_auth" = [])),
    tag = "User Permissions"
)]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPermissionsResponse>, AppError> {
    require_permission(&state, &user, VIEW_USER_PERMISSIONS).await?;

    let effective = state.resolver.get_user_permissions(user_id).await?;
    Ok(Json(UserPermissionsResponse::new(user_id, &effective)))
}

#[utoipa::path(
    get,
    path = "/users/{id}/permissions/check",
    params(("id" = Uuid, Path, description = "User id"), CheckPermissionsQuery),
    responses(
        (status = 200, description = "Check outcome", body = PermissionCheckResponse),
        (status = 400, description = "No permission names given")
    ),
    security(("bearer_auth" = [])),
    tag = "User Permissions"
)]
pub async fn check_user_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
    Query(query): Query<CheckPermissionsQuery>,
) -> Result<Json<PermissionCheckResponse>, AppError> {
    require_permission(&state, &user, VIEW_USER_PERMISSIONS).await?;

    let names = query.names();
    if names.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "At least one permission name is required"
        )));
    }

    let (granted, mode) = match query.mode {
        CheckMode::Any => (state.resolver.has_any_permission(user_id, &names).await?, "any"),
        CheckMode::All => (state.resolver.has_all_permissions(user_id, &names).await?, "all"),
    };

    Ok(Json(PermissionCheckResponse {
        user_id,
        permissions: names,
        mode: mode.to_string(),
        granted,
    }))
}

/// Add a direct permission override
#[utoipa::path(
    post,
    path = "/users/{id}/permissions",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = AddPermissionRequest,
    responses(
        (status = 200, description = "Updated effective permissions", body = UserPermissionsResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User Permissions"
)]
pub async fn add_user_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AddPermissionRequest>,
) -> Result<Json<UserPermissionsResponse>, AppError> {
    req.validate()?;
    require_permission(&state, &user, MANAGE_USER_PERMISSIONS).await?;

    let effective = state
        .resolver
        .add_user_permission(user_id, &req.permission)
        .await?;
    Ok(Json(UserPermissionsResponse::new(user_id, &effective)))
}

/// Remove a direct permission override
#[utoipa::path(
    delete,
    path = "/users/{id}/permissions/{permission}",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("permission" = String, Path, description = "Permission name")
    ),
    responses(
        (status = 200, description = "Updated effective permissions", body = UserPermissionsResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User Permissions"
)]
pub async fn remove_user_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path((user_id, permission)): Path<(Uuid, String)>,
) -> Result<Json<UserPermissionsResponse>, AppError> {
    require_permission(&state, &user, MANAGE_USER_PERMISSIONS).await?;

    let effective = state
        .resolver
        .remove_user_permission(user_id, &permission)
        .await?;
    Ok(Json(UserPermissionsResponse::new(user_id, &effective)))
}

/// Recompute and store the cached effective set
#[utoipa::path(
    post,
    path = "/users/{id}/permissions/refresh",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Refreshed effective permissions", body = UserPermissionsResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User Permissions"
)]
pub async fn refresh_user_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPermissionsResponse>, AppError> {
    require_permission(&state, &user, MANAGE_USER_PERMISSIONS).await?;

    let effective = state.resolver.refresh_user_permissions(user_id).await?;
    Ok(Json(UserPermissionsResponse::new(user_id, &effective)))
}
