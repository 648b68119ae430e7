//! Temporary permission model - time-boxed grants issued outside the role system,
//! plus their append-only audit trail.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::role_assignment::Lifecycle;

/// Temporary permission entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemporaryPermission {
    pub temp_permission_id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
    pub granted_by: Uuid,
    pub granted_utc: DateTime<Utc>,
    pub expires_utc: DateTime<Utc>,
    pub reason: String,
    pub is_active: bool,
    pub source_request_id: Option<Uuid>,
    pub updated_utc: DateTime<Utc>,
}

impl TemporaryPermission {
    pub fn new(
        user_id: Uuid,
        permission: String,
        granted_by: Uuid,
        expires_utc: DateTime<Utc>,
        reason: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            temp_permission_id: Uuid::new_v4(),
            user_id,
            permission,
            granted_by,
            granted_utc: now,
            expires_utc,
            reason,
            is_active: true,
            source_request_id: None,
            updated_utc: now,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_flag(self.is_active)
    }

    /// Active and not yet past its expiry.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.lifecycle().is_active() && self.expires_utc > now
    }

    /// Still flagged active although the expiry has passed; the next sweep
    /// deactivates it.
    pub fn is_awaiting_sweep_at(&self, now: DateTime<Utc>) -> bool {
        self.lifecycle().is_active() && self.expires_utc <= now
    }
}

/// Lifecycle transitions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Granted,
    Extended,
    Revoked,
    Deactivated,
    Activated,
    Expired,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Granted => "granted",
            AuditAction::Extended => "extended",
            AuditAction::Revoked => "revoked",
            AuditAction::Deactivated => "deactivated",
            AuditAction::Activated => "activated",
            AuditAction::Expired => "expired",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "granted" => Ok(AuditAction::Granted),
            "extended" => Ok(AuditAction::Extended),
            "revoked" => Ok(AuditAction::Revoked),
            "deactivated" => Ok(AuditAction::Deactivated),
            "activated" => Ok(AuditAction::Activated),
            "expired" => Ok(AuditAction::Expired),
            other => Err(format!("unknown audit action '{}'", other)),
        }
    }
}

/// Audit entry entity. `performed_by` is `None` for sweeps.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionAuditEntry {
    pub audit_id: Uuid,
    pub temp_permission_id: Uuid,
    pub action_code: String,
    pub performed_by: Option<Uuid>,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl PermissionAuditEntry {
    pub fn new(
        temp_permission_id: Uuid,
        action: AuditAction,
        performed_by: Option<Uuid>,
        reason: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            temp_permission_id,
            action_code: action.as_str().to_string(),
            performed_by,
            reason,
            metadata,
            created_utc: Utc::now(),
        }
    }
}

/// Sweep actor label used in API output.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Temporary permission response for API.
#[derive(Debug, Serialize, ToSchema)]
pub struct TemporaryPermissionResponse {
    pub temp_permission_id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
    pub granted_by: Uuid,
    pub granted_utc: DateTime<Utc>,
    pub expires_utc: DateTime<Utc>,
    pub reason: String,
    pub is_active: bool,
    /// Active and unexpired right now.
    pub is_live: bool,
    pub source_request_id: Option<Uuid>,
}

impl From<TemporaryPermission> for TemporaryPermissionResponse {
    fn from(t: TemporaryPermission) -> Self {
        let is_live = t.is_live_at(Utc::now());
        Self {
            temp_permission_id: t.temp_permission_id,
            user_id: t.user_id,
            permission: t.permission,
            granted_by: t.granted_by,
            granted_utc: t.granted_utc,
            expires_utc: t.expires_utc,
            reason: t.reason,
            is_active: t.is_active,
            is_live,
            source_request_id: t.source_request_id,
        }
    }
}

/// Audit entry response for API.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEntryResponse {
    pub audit_id: Uuid,
    pub temp_permission_id: Uuid,
    pub action: String,
    /// Staff id of the actor, or `SYSTEM` for sweeps.
    pub performed_by: String,
    pub reason: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl From<PermissionAuditEntry> for AuditEntryResponse {
    fn from(e: PermissionAuditEntry) -> Self {
        Self {
            audit_id: e.audit_id,
            temp_permission_id: e.temp_permission_id,
            action: e.action_code.to_uppercase(),
            performed_by: e
                .performed_by
                .map(|id| id.to_string())
                .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
            reason: e.reason,
            metadata: e.metadata,
            created_utc: e.created_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(expires_in: Duration) -> TemporaryPermission {
        TemporaryPermission::new(
            Uuid::new_v4(),
            "view_reports".to_string(),
            Uuid::new_v4(),
            Utc::now() + expires_in,
            "audit".to_string(),
        )
    }

    #[test]
    fn live_until_expiry() {
        let now = Utc::now();
        let g = grant(Duration::hours(1));
        assert!(g.is_live_at(now));
        assert!(!g.is_live_at(now + Duration::hours(2)));
        assert!(g.is_awaiting_sweep_at(now + Duration::hours(2)));
    }

    #[test]
    fn inactive_grant_is_neither_live_nor_swept() {
        let mut g = grant(Duration::minutes(-5));
        g.is_active = false;
        let now = Utc::now();
        assert!(!g.is_live_at(now));
        assert!(!g.is_awaiting_sweep_at(now));
    }

    #[test]
    fn audit_actor_defaults_to_system() {
        let entry = PermissionAuditEntry::new(Uuid::new_v4(), AuditAction::Expired, None, None, None);
        let response = AuditEntryResponse::from(entry);
        assert_eq!(response.performed_by, SYSTEM_ACTOR);
        assert_eq!(response.action, "EXPIRED");
    }

    #[test]
    fn audit_action_round_trips_through_code() {
        for action in [AuditAction::Granted, AuditAction::Revoked, AuditAction::Activated] {
            assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
        }
        assert!("forgotten".parse::<AuditAction>().is_err());
    }
}
