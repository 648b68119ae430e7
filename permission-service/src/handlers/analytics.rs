//! Read-only permission analytics. Informational only; never consulted for
//! access decisions.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::db::analytics::DepartmentUsage;
use crate::middleware::{require_permission, AuthUser};
use crate::models::permission::VIEW_PERMISSION_ANALYTICS;
use crate::services::analytics::{
    Dashboard, OptimizationSuggestion, PermissionRisk, SystemUsage, UserPermissionAnalytics,
};
use crate::AppState;

/// Permission breakdown for one user. Users may always view their own.
#[utoipa::path(
    get,
    path = "/permission-analytics/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Per-user analytics", body = UserPermissionAnalytics),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission Analytics"
)]
pub async fn user_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPermissionAnalytics>, AppError> {
    if user.user_id()? != user_id {
        require_permission(&state, &user, VIEW_PERMISSION_ANALYTICS).await?;
    }
    Ok(Json(state.analytics.user_analytics(user_id).await?))
}

#[utoipa::path(
    get,
    path = "/permission-analytics/system-usage",
    responses((status = 200, description = "System-wide totals and holder counts", body = SystemUsage)),
    security(("bearer_auth" = [])),
    tag = "Permission Analytics"
)]
pub async fn system_usage(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<SystemUsage>, AppError> {
    require_permission(&state, &user, VIEW_PERMISSION_ANALYTICS).await?;
    Ok(Json(state.analytics.system_usage().await?))
}

#[utoipa::path(
    get,
    path = "/permission-analytics/department-distribution",
    responses((status = 200, description = "Usage per department", body = [DepartmentUsage])),
    security(("bearer_auth" = [])),
    tag = "Permission Analytics"
)]
pub async fn department_distribution(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<DepartmentUsage>>, AppError> {
    require_permission(&state, &user, VIEW_PERMISSION_ANALYTICS).await?;
    Ok(Json(state.analytics.department_distribution().await?))
}

/// Held permissions ranked by heuristic risk, highest first
#[utoipa::path(
    get,
    path = "/permission-analytics/risk-assessment",
    responses((status = 200, description = "Risk ranking", body = [PermissionRisk])),
    security(("bearer_auth" = [])),
    tag = "Permission Analytics"
)]
pub async fn risk_assessment(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<PermissionRisk>>, AppError> {
    require_permission(&state, &user, VIEW_PERMISSION_ANALYTICS).await?;
    Ok(Json(state.analytics.risk_assessment().await?))
}

#[utoipa::path(
    get,
    path = "/permission-analytics/optimization-suggestions",
    responses((status = 200, description = "Suggestions", body = [OptimizationSuggestion])),
    security(("bearer_auth" = [])),
    tag = "Permission Analytics"
)]
pub async fn optimization_suggestions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<OptimizationSuggestion>>, AppError> {
    require_permission(&state, &user, VIEW_PERMISSION_ANALYTICS).await?;
    Ok(Json(state.analytics.optimization_suggestions().await?))
}

#[utoipa::path(
    get,
    path = "/permission-analytics/dashboard",
    responses((status = 200, description = "Dashboard", body = Dashboard)),
    security(("bearer_auth" = [])),
    tag = "Permission Analytics"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Dashboard>, AppError> {
    require_permission(&state, &user, VIEW_PERMISSION_ANALYTICS).await?;
    Ok(Json(state.analytics.dashboard().await?))
}
