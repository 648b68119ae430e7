//! HTTP handlers for permission-service.

pub mod analytics;
pub mod metrics;
pub mod permission_requests;
pub mod roles;
pub mod temporary_permissions;
pub mod users;
