use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::EffectivePermissions;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddPermissionRequest {
    #[validate(length(min = 1, max = 100))]
    pub permission: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    #[default]
    Any,
    All,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CheckPermissionsQuery {
    /// Comma-separated permission names.
    pub permissions: String,
    #[serde(default)]
    pub mode: CheckMode,
}

impl CheckPermissionsQuery {
    pub fn names(&self) -> Vec<String> {
        self.permissions
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserPermissionsResponse {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub permissions: Vec<String>,
}

impl UserPermissionsResponse {
    pub fn new(user_id: Uuid, effective: &EffectivePermissions) -> Self {
        Self {
            user_id,
            is_admin: effective.is_admin(),
            permissions: effective.to_vec(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub user_id: Uuid,
    pub permissions: Vec<String>,
    pub mode: String,
    pub granted: bool,
}
