pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, PermissionConfig, SwaggerMode};
use crate::services::{
    AnalyticsService, JwtService, PermissionRequestService, PermissionResolver, RoleService,
    TemporaryPermissionService,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::metrics::metrics,
        handlers::roles::create_role,
        handlers::roles::list_roles,
        handlers::roles::get_role,
        handlers::roles::update_role,
        handlers::roles::delete_role,
        handlers::roles::assign_role,
        handlers::roles::remove_role,
        handlers::roles::get_staff_roles,
        handlers::temporary_permissions::create_temporary_permission,
        handlers::temporary_permissions::list_temporary_permissions,
        handlers::temporary_permissions::list_user_temporary_permissions,
        handlers::temporary_permissions::list_expiring_permissions,
        handlers::temporary_permissions::get_temporary_permission,
        handlers::temporary_permissions::get_audit_trail,
        handlers::temporary_permissions::extend_temporary_permission,
        handlers::temporary_permissions::revoke_temporary_permission,
        handlers::temporary_permissions::update_temporary_permission,
        handlers::temporary_permissions::delete_temporary_permission,
        handlers::temporary_permissions::cleanup_expired_permissions,
        handlers::permission_requests::create_permission_request,
        handlers::permission_requests::list_permission_requests,
        handlers::permission_requests::list_my_requests,
        handlers::permission_requests::list_pending_approval,
        handlers::permission_requests::get_permission_request,
        handlers::permission_requests::approve_permission_request,
        handlers::permission_requests::reject_permission_request,
        handlers::permission_requests::cancel_permission_request,
        handlers::permission_requests::delete_permission_request,
        handlers::permission_requests::cleanup_expired_requests,
        handlers::users::get_my_permissions,
        handlers::users::get_user_permissions,
        handlers::users::check_user_permissions,
        handlers::users::add_user_permission,
        handlers::users::remove_user_permission,
        handlers::users::refresh_user_permissions,
        handlers::analytics::user_analytics,
        handlers::analytics::system_usage,
        handlers::analytics::department_distribution,
        handlers::analytics::risk_assessment,
        handlers::analytics::optimization_suggestions,
        handlers::analytics::dashboard,
    ),
    components(
        schemas(
            dtos::MessageResponse,
            dtos::roles::CreateRoleRequest,
            dtos::roles::UpdateRoleRequest,
            dtos::roles::AssignRoleRequest,
            dtos::temporary_permissions::CreateTemporaryPermissionRequest,
            dtos::temporary_permissions::ExtendTemporaryPermissionRequest,
            dtos::temporary_permissions::RevokeTemporaryPermissionRequest,
            dtos::temporary_permissions::UpdateTemporaryPermissionRequest,
            dtos::permission_requests::CreatePermissionRequestBody,
            dtos::permission_requests::DecisionRequest,
            dtos::users::AddPermissionRequest,
            dtos::users::CheckMode,
            dtos::users::UserPermissionsResponse,
            dtos::users::PermissionCheckResponse,
            models::RoleResponse,
            models::AssignmentScope,
            models::AssignmentResponse,
            models::AssignmentDetail,
            models::TemporaryPermissionResponse,
            models::AuditEntryResponse,
            models::AuditAction,
            models::RequestStatus,
            models::Urgency,
            models::ApproverStatus,
            models::ApproverResponse,
            models::PermissionRequestResponse,
            services::temporary_permission::CleanupSummary,
            handlers::permission_requests::ExpiredRequestsResponse,
            services::analytics::RiskLevel,
            services::analytics::PermissionRisk,
            services::analytics::SuggestionKind,
            services::analytics::OptimizationSuggestion,
            services::analytics::UserPermissionAnalytics,
            services::analytics::PermissionUsage,
            services::analytics::SystemUsage,
            services::analytics::Dashboard,
            db::analytics::SystemTotals,
            db::analytics::DepartmentUsage,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Roles", description = "Role catalogue and staff role assignments"),
        (name = "Temporary Permissions", description = "Time-bounded permission grants and their audit trail"),
        (name = "Permission Requests", description = "Request and approval workflow for temporary permissions"),
        (name = "User Permissions", description = "Effective permission resolution and direct overrides"),
        (name = "Permission Analytics", description = "Read-only usage, risk and optimization reports"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: PermissionConfig,
    pub pool: PgPool,
    pub jwt: JwtService,
    pub resolver: PermissionResolver,
    pub roles: RoleService,
    pub temporary_permissions: TemporaryPermissionService,
    pub permission_requests: PermissionRequestService,
    pub analytics: AnalyticsService,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every service onto one shared pool.
    pub fn new(
        config: PermissionConfig,
        pool: PgPool,
        jwt: JwtService,
        ip_rate_limiter: IpRateLimiter,
    ) -> Self {
        Self {
            resolver: PermissionResolver::new(pool.clone()),
            roles: RoleService::new(pool.clone()),
            temporary_permissions: TemporaryPermissionService::new(pool.clone()),
            permission_requests: PermissionRequestService::new(
                pool.clone(),
                config.grants.default_request_grant_hours,
            ),
            analytics: AnalyticsService::new(pool.clone(), config.grants.expiring_soon_hours),
            config,
            pool,
            jwt,
            ip_rate_limiter,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let ip_limiter = state.ip_rate_limiter.clone();

    let protected = Router::new()
        .route("/roles", post(handlers::roles::create_role).get(handlers::roles::list_roles))
        .route(
            "/roles/:id",
            get(handlers::roles::get_role)
                .patch(handlers::roles::update_role)
                .delete(handlers::roles::delete_role),
        )
        .route("/roles/staff/:staff_id", get(handlers::roles::get_staff_roles))
        .route("/roles/staff/:staff_id/assign", post(handlers::roles::assign_role))
        .route(
            "/roles/staff/:staff_id/roles/:role_id",
            delete(handlers::roles::remove_role),
        )
        .route(
            "/temporary-permissions",
            post(handlers::temporary_permissions::create_temporary_permission)
                .get(handlers::temporary_permissions::list_temporary_permissions),
        )
        .route(
            "/temporary-permissions/user/:user_id",
            get(handlers::temporary_permissions::list_user_temporary_permissions),
        )
        .route(
            "/temporary-permissions/expiring",
            get(handlers::temporary_permissions::list_expiring_permissions),
        )
        .route(
            "/temporary-permissions/cleanup",
            post(handlers::temporary_permissions::cleanup_expired_permissions),
        )
        .route(
            "/temporary-permissions/:id",
            get(handlers::temporary_permissions::get_temporary_permission)
                .patch(handlers::temporary_permissions::update_temporary_permission)
                .delete(handlers::temporary_permissions::delete_temporary_permission),
        )
        .route(
            "/temporary-permissions/:id/extend",
            patch(handlers::temporary_permissions::extend_temporary_permission),
        )
        .route(
            "/temporary-permissions/:id/revoke",
            patch(handlers::temporary_permissions::revoke_temporary_permission),
        )
        .route(
            "/temporary-permissions/:id/audit",
            get(handlers::temporary_permissions::get_audit_trail),
        )
        .route(
            "/permission-requests",
            post(handlers::permission_requests::create_permission_request)
                .get(handlers::permission_requests::list_permission_requests),
        )
        .route(
            "/permission-requests/mine",
            get(handlers::permission_requests::list_my_requests),
        )
        .route(
            "/permission-requests/pending-approval",
            get(handlers::permission_requests::list_pending_approval),
        )
        .route(
            "/permission-requests/cleanup",
            post(handlers::permission_requests::cleanup_expired_requests),
        )
        .route(
            "/permission-requests/:id",
            get(handlers::permission_requests::get_permission_request)
                .delete(handlers::permission_requests::delete_permission_request),
        )
        .route(
            "/permission-requests/:id/approve",
            post(handlers::permission_requests::approve_permission_request),
        )
        .route(
            "/permission-requests/:id/reject",
            post(handlers::permission_requests::reject_permission_request),
        )
        .route(
            "/permission-requests/:id/cancel",
            post(handlers::permission_requests::cancel_permission_request),
        )
        .route("/users/me/permissions", get(handlers::users::get_my_permissions))
        .route(
            "/users/:id/permissions",
            get(handlers::users::get_user_permissions).post(handlers::users::add_user_permission),
        )
        .route(
            "/users/:id/permissions/check",
            get(handlers::users::check_user_permissions),
        )
        .route(
            "/users/:id/permissions/refresh",
            post(handlers::users::refresh_user_permissions),
        )
        .route(
            "/users/:id/permissions/:permission",
            delete(handlers::users::remove_user_permission),
        )
        .route(
            "/permission-analytics/user/:user_id",
            get(handlers::analytics::user_analytics),
        )
        .route(
            "/permission-analytics/system-usage",
            get(handlers::analytics::system_usage),
        )
        .route(
            "/permission-analytics/department-distribution",
            get(handlers::analytics::department_distribution),
        )
        .route(
            "/permission-analytics/risk-assessment",
            get(handlers::analytics::risk_assessment),
        )
        .route(
            "/permission-analytics/optimization-suggestions",
            get(handlers::analytics::optimization_suggestions),
        )
        .route(
            "/permission-analytics/dashboard",
            get(handlers::analytics::dashboard),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let allowed_origins = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<axum::http::HeaderValue>() {
            Ok(origin) => Some(origin),
            Err(e) => {
                tracing::error!("Ignoring invalid CORS origin '{}': {}", o, e);
                None
            }
        })
        .collect::<Vec<_>>();

    let app = app
        .merge(protected)
        .with_state(state)
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::HeaderName::from_static(REQUEST_ID_HEADER),
                ]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::health_check(&state.pool).await.map_err(|e| {
        tracing::error!(error = %e, "PostgreSQL health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up"
        }
    })))
}
