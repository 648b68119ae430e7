//! Users and staff members as seen by the permission subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform user. Only the permission columns are written by this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    /// Direct overrides, may contain `admin`.
    pub direct_permissions: Vec<String>,
    /// Denormalized effective set, rewritten by every refresh.
    pub effective_permissions: Vec<String>,
    pub permissions_refreshed_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

/// Staff member: the unit roles are assigned to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StaffMember {
    pub staff_id: Uuid,
    pub user_id: Uuid,
    pub department_id: Option<Uuid>,
    pub job_title: Option<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}
