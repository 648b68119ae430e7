pub mod auth;
pub mod capability;
pub mod metrics;

pub use auth::{auth_middleware, AuthUser};
pub use capability::{require_any_permission, require_permission};
pub use metrics::metrics_middleware;
