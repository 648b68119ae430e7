//! Capability guards called at the top of handlers.
//!
//! The caller's effective set always includes `admin` when they are an
//! administrator, and `admin` satisfies every check.

use service_core::error::AppError;

use crate::middleware::AuthUser;
use crate::services::metrics;
use crate::AppState;

/// Fail with 403 unless the caller holds `permission`.
pub async fn require_permission(
    state: &AppState,
    user: &AuthUser,
    permission: &str,
) -> Result<(), AppError> {
    require_any_permission(state, user, &[permission]).await
}

/// Fail with 403 unless the caller holds at least one of `permissions`.
pub async fn require_any_permission(
    state: &AppState,
    user: &AuthUser,
    permissions: &[&str],
) -> Result<(), AppError> {
    let user_id = user.user_id()?;
    let allowed = state.resolver.has_any_permission(user_id, permissions).await?;

    for permission in permissions {
        metrics::record_permission_check(permission, allowed);
    }

    if allowed {
        return Ok(());
    }

    tracing::warn!(
        user_id = %user_id,
        required = ?permissions,
        "Insufficient permissions"
    );
    Err(AppError::Forbidden(anyhow::anyhow!(
        "Insufficient permissions. Required: {}",
        permissions.join(" or ")
    )))
}
