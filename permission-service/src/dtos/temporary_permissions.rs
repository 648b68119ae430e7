use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTemporaryPermissionRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub permission: String,
    pub expires_utc: DateTime<Utc>,
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExtendTemporaryPermissionRequest {
    pub expires_utc: DateTime<Utc>,
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RevokeTemporaryPermissionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

/// Administrative edit; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTemporaryPermissionRequest {
    pub expires_utc: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 1000))]
    pub reason: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListTemporaryPermissionsQuery {
    pub user_id: Option<Uuid>,
    pub permission: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Longest "expiring within" window accepted, one year.
pub const MAX_EXPIRING_WINDOW_HOURS: i64 = 8_760;

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct ExpiringQuery {
    #[validate(range(min = 0, max = 8760))]
    pub within_hours: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiring_window_is_bounded() {
        let ok = ExpiringQuery { within_hours: Some(MAX_EXPIRING_WINDOW_HOURS) };
        assert!(ok.validate().is_ok());

        let unset = ExpiringQuery { within_hours: None };
        assert!(unset.validate().is_ok());

        let huge = ExpiringQuery { within_hours: Some(3_000_000_000) };
        assert!(huge.validate().is_err());

        let negative = ExpiringQuery { within_hours: Some(-1) };
        assert!(negative.validate().is_err());
    }
}
