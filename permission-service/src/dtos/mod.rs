//! Request bodies and query strings accepted by the HTTP surface.

pub mod permission_requests;
pub mod roles;
pub mod temporary_permissions;
pub mod users;

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
