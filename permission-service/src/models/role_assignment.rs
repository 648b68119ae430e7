//! Staff role assignment model - scoped, optionally expiring role grants.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Scope an assignment applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentScope {
    #[default]
    Global,
    Department,
    Service,
    Patient,
}

impl AssignmentScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentScope::Global => "global",
            AssignmentScope::Department => "department",
            AssignmentScope::Service => "service",
            AssignmentScope::Patient => "patient",
        }
    }

    /// Non-global scopes must name the entity they apply to.
    pub fn requires_scope_id(&self) -> bool {
        !matches!(self, AssignmentScope::Global)
    }
}

impl fmt::Display for AssignmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(AssignmentScope::Global),
            "department" => Ok(AssignmentScope::Department),
            "service" => Ok(AssignmentScope::Service),
            "patient" => Ok(AssignmentScope::Patient),
            other => Err(format!("unknown assignment scope '{}'", other)),
        }
    }
}

/// Active/inactive flag shared by assignments and temporary grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Inactive,
}

impl Lifecycle {
    pub fn from_flag(is_active: bool) -> Self {
        if is_active {
            Lifecycle::Active
        } else {
            Lifecycle::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

/// Assignment entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StaffRoleAssignment {
    pub assignment_id: Uuid,
    pub staff_id: Uuid,
    pub role_id: Uuid,
    pub scope_code: String,
    pub scope_id: Option<Uuid>,
    pub conditions: Option<serde_json::Value>,
    pub assigned_by: Option<Uuid>,
    pub assigned_utc: DateTime<Utc>,
    pub expires_utc: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub updated_utc: DateTime<Utc>,
}

impl StaffRoleAssignment {
    pub fn new(
        staff_id: Uuid,
        role_id: Uuid,
        scope: AssignmentScope,
        scope_id: Option<Uuid>,
        assigned_by: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            assignment_id: Uuid::new_v4(),
            staff_id,
            role_id,
            scope_code: scope.as_str().to_string(),
            scope_id,
            conditions: None,
            assigned_by,
            assigned_utc: now,
            expires_utc: None,
            is_active: true,
            updated_utc: now,
        }
    }

    pub fn scope(&self) -> AssignmentScope {
        self.scope_code.parse().unwrap_or_default()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_flag(self.is_active)
    }

    /// Bring the assignment back with fresh terms. Returns false, leaving the
    /// row untouched, when it is already active.
    pub fn reactivate(
        &mut self,
        conditions: Option<serde_json::Value>,
        expires_utc: Option<DateTime<Utc>>,
        assigned_by: Option<Uuid>,
    ) -> bool {
        if self.lifecycle().is_active() {
            return false;
        }
        let now = Utc::now();
        self.is_active = true;
        self.conditions = conditions;
        self.expires_utc = expires_utc;
        self.assigned_by = assigned_by;
        self.assigned_utc = now;
        self.updated_utc = now;
        true
    }

    /// Whether this assignment currently contributes its role's permissions.
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.lifecycle().is_active() && self.expires_utc.is_none_or(|exp| exp > now)
    }
}

/// Assignment joined with role and staff details, as returned by listings.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AssignmentDetail {
    pub assignment_id: Uuid,
    pub staff_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
    pub role_code: String,
    pub scope_code: String,
    pub scope_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub conditions: Option<serde_json::Value>,
    pub assigned_by: Option<Uuid>,
    pub assigned_by_name: Option<String>,
    pub assigned_utc: DateTime<Utc>,
    pub expires_utc: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Assignment response for API.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub assignment_id: Uuid,
    pub staff_id: Uuid,
    pub role_id: Uuid,
    pub scope: AssignmentScope,
    pub scope_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub conditions: Option<serde_json::Value>,
    pub assigned_by: Option<Uuid>,
    pub assigned_utc: DateTime<Utc>,
    pub expires_utc: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<StaffRoleAssignment> for AssignmentResponse {
    fn from(a: StaffRoleAssignment) -> Self {
        Self {
            scope: a.scope(),
            assignment_id: a.assignment_id,
            staff_id: a.staff_id,
            role_id: a.role_id,
            scope_id: a.scope_id,
            conditions: a.conditions,
            assigned_by: a.assigned_by,
            assigned_utc: a.assigned_utc,
            expires_utc: a.expires_utc,
            is_active: a.is_active,
        }
    }
}
