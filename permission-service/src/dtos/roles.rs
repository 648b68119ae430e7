use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::AssignmentScope;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    pub role_name: String,
    #[validate(length(min = 1, max = 50))]
    pub role_code: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    pub role_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub role_code: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
    #[serde(default)]
    pub scope: AssignmentScope,
    pub scope_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub conditions: Option<serde_json::Value>,
    pub expires_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListRolesQuery {
    #[serde(default)]
    pub active_only: bool,
}
