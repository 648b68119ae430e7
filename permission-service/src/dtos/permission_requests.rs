use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{RequestStatus, Urgency};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePermissionRequestBody {
    #[validate(length(min = 1, max = 100))]
    pub permission: String,
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
    #[serde(default)]
    pub urgency: Urgency,
    pub expires_utc: Option<DateTime<Utc>>,
    #[validate(length(min = 1))]
    pub approver_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct DecisionRequest {
    #[validate(length(max = 1000))]
    pub comments: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListPermissionRequestsQuery {
    pub status: Option<RequestStatus>,
    pub requester_id: Option<Uuid>,
    pub approver_id: Option<Uuid>,
}
