//! Services layer for permission-service.
//!
//! Business rules for permission resolution, role assignment, temporary
//! grants, the request workflow and analytics. Each service owns a pool
//! handle and opens its own transactions.

pub mod analytics;
pub mod error;
mod jwt;
pub mod metrics;
pub mod permission_request;
pub mod resolution;
pub mod role;
pub mod temporary_permission;

pub use analytics::AnalyticsService;
pub use error::{ServiceError, ServiceResult};
pub use jwt::{AccessTokenClaims, JwtService};
pub use permission_request::PermissionRequestService;
pub use resolution::PermissionResolver;
pub use role::RoleService;
pub use temporary_permission::TemporaryPermissionService;
