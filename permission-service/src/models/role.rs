//! Role model - named, reusable bundles of permission strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub role_name: String,
    pub role_code: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Role {
    /// Create a new active role. The code is stored upper-case.
    pub fn new(
        role_name: String,
        role_code: &str,
        description: Option<String>,
        permissions: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            role_id: Uuid::new_v4(),
            role_name: role_name.trim().to_string(),
            role_code: normalize_role_code(role_code),
            description,
            permissions,
            is_active: true,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn grants(&self, permission: &str) -> bool {
        self.is_active && self.permissions.iter().any(|p| p == permission)
    }
}

pub fn normalize_role_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Role response for API.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    pub role_id: Uuid,
    pub role_name: String,
    pub role_code: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            role_id: r.role_id,
            role_name: r.role_name,
            role_code: r.role_code,
            description: r.description,
            permissions: r.permissions,
            is_active: r.is_active,
            created_utc: r.created_utc,
            updated_utc: r.updated_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_role_uppercases_code() {
        let role = Role::new(
            "Charge Nurse".to_string(),
            " charge_nurse ",
            None,
            vec!["view_reports".to_string()],
        );
        assert_eq!(role.role_code, "CHARGE_NURSE");
        assert!(role.is_active);
    }

    #[test]
    fn inactive_role_grants_nothing() {
        let mut role = Role::new(
            "Auditor".to_string(),
            "AUDITOR",
            None,
            vec!["view_reports".to_string()],
        );
        assert!(role.grants("view_reports"));
        role.is_active = false;
        assert!(!role.grants("view_reports"));
    }
}
