//! Role catalogue and staff role assignment handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::roles::{AssignRoleRequest, CreateRoleRequest, ListRolesQuery, UpdateRoleRequest};
use crate::dtos::MessageResponse;
use crate::middleware::{require_permission, AuthUser};
use crate::models::permission::{ASSIGN_ROLES, MANAGE_ROLES, VIEW_ROLES};
use crate::models::{AssignmentDetail, AssignmentResponse, RoleResponse};
use crate::AppState;

/// Create a role
#[utoipa::path(
    post,
    path = "/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 403, description = "Caller lacks manage_roles"),
        (status = 409, description = "Role name or code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn create_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), AppError> {
    req.validate()?;
    require_permission(&state, &user, MANAGE_ROLES).await?;

    let role = state.roles.create_role(req).await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

/// List roles ordered by name
#[utoipa::path(
    get,
    path = "/roles",
    params(ListRolesQuery),
    responses((status = 200, description = "Roles", body = [RoleResponse])),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn list_roles(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListRolesQuery>,
) -> Result<Json<Vec<RoleResponse>>, AppError> {
    require_permission(&state, &user, VIEW_ROLES).await?;

    let roles = state.roles.list_roles(query.active_only).await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = RoleResponse),
        (status = 404, description = "Role not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn get_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(role_id): Path<Uuid>,
) -> Result<Json<RoleResponse>, AppError> {
    require_permission(&state, &user, VIEW_ROLES).await?;

    let role = state.roles.get_role(role_id).await?;
    Ok(Json(role.into()))
}

/// Partially update a role. Holders are refreshed when its permissions or
/// active flag change.
#[utoipa::path(
    patch,
    path = "/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role name or code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn update_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(role_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponse>, AppError> {
    req.validate()?;
    require_permission(&state, &user, MANAGE_ROLES).await?;

    let role = state.roles.update_role(role_id, req).await?;
    Ok(Json(role.into()))
}

#[utoipa::path(
    delete,
    path = "/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted", body = MessageResponse),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role still has active assignments")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn delete_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(role_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    require_permission(&state, &user, MANAGE_ROLES).await?;

    state.roles.delete_role(role_id).await?;
    Ok(Json(MessageResponse::new("Role deleted")))
}

/// Assign a role to a staff member
#[utoipa::path(
    post,
    path = "/roles/staff/{staff_id}/assign",
    params(("staff_id" = Uuid, Path, description = "Staff member id")),
    request_body = AssignRoleRequest,
    responses(
        (status = 201, description = "Role assigned", body = AssignmentResponse),
        (status = 400, description = "Missing scope id or inactive role"),
        (status = 404, description = "Staff member or role not found"),
        (status = 409, description = "Role already assigned at this scope")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn assign_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(staff_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>), AppError> {
    req.validate()?;
    require_permission(&state, &user, ASSIGN_ROLES).await?;

    let assignment = state
        .roles
        .assign_role_to_staff(staff_id, req, Some(user.user_id()?))
        .await?;
    Ok((StatusCode::CREATED, Json(assignment.into())))
}

#[utoipa::path(
    delete,
    path = "/roles/staff/{staff_id}/roles/{role_id}",
    params(
        ("staff_id" = Uuid, Path, description = "Staff member id"),
        ("role_id" = Uuid, Path, description = "Role id")
    ),
    responses(
        (status = 200, description = "Role removed", body = MessageResponse),
        (status = 404, description = "No active assignment for this pair")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn remove_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path((staff_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    require_permission(&state, &user, ASSIGN_ROLES).await?;

    state.roles.remove_role_from_staff(staff_id, role_id).await?;
    Ok(Json(MessageResponse::new("Role removed from staff member")))
}

/// Active assignments of a staff member, newest first
#[utoipa::path(
    get,
    path = "/roles/staff/{staff_id}",
    params(("staff_id" = Uuid, Path, description = "Staff member id")),
    responses(
        (status = 200, description = "Active assignments", body = [AssignmentDetail]),
        (status = 404, description = "Staff member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn get_staff_roles(
    State(state): State<AppState>,
    user: AuthUser,
    Path(staff_id): Path<Uuid>,
) -> Result<Json<Vec<AssignmentDetail>>, AppError> {
    require_permission(&state, &user, VIEW_ROLES).await?;

    Ok(Json(state.roles.get_staff_roles(staff_id).await?))
}
