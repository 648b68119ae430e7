//! Temporary permission ledger: issue, extend, revoke, edit, delete and sweep
//! time-boxed grants. Every transition writes an audit entry and refreshes the
//! grantee's cached permissions inside the same transaction.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db;
use crate::db::temporary_permissions::GrantFilter;
use crate::dtos::temporary_permissions::{
    CreateTemporaryPermissionRequest, ExtendTemporaryPermissionRequest,
    RevokeTemporaryPermissionRequest, UpdateTemporaryPermissionRequest,
};
use crate::models::permission::{
    normalize_permission, ADMIN, GRANT_TEMPORARY_PERMISSIONS, MANAGE_TEMPORARY_PERMISSIONS,
};
use crate::models::{AuditAction, PermissionAuditEntry, StaffMember, TemporaryPermission};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::metrics;
use crate::services::resolution::{ensure_any_in, refresh_in};
use crate::utils::humanize_duration;

const MAX_PAGE_SIZE: i64 = 200;

/// End of an "expiring within" window starting at `now`. Negative windows
/// are treated as empty; windows past chrono's range are rejected.
pub fn expiry_horizon(now: DateTime<Utc>, within_hours: i64) -> ServiceResult<DateTime<Utc>> {
    Duration::try_hours(within_hours.max(0))
        .and_then(|window| now.checked_add_signed(window))
        .ok_or_else(|| ServiceError::Validation(format!("within_hours {} is out of range", within_hours)))
}

/// Parameters for issuing a grant, shared by direct grants and request approval.
#[derive(Debug, Clone)]
pub struct NewGrant {
    pub user_id: Uuid,
    pub permission: String,
    pub expires_utc: DateTime<Utc>,
    pub reason: String,
    pub granted_by: Uuid,
    pub source_request_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CleanupSummary {
    pub deactivated: usize,
    pub affected_users: usize,
}

async fn write_audit(
    conn: &mut PgConnection,
    grant: &TemporaryPermission,
    action: AuditAction,
    performed_by: Option<Uuid>,
    reason: Option<String>,
    metadata: serde_json::Value,
) -> Result<(), sqlx::Error> {
    let entry = PermissionAuditEntry::new(
        grant.temp_permission_id,
        action,
        performed_by,
        reason,
        Some(metadata),
    );
    db::audit::insert_entry(&mut *conn, &entry).await?;
    metrics::record_grant_event(action.as_str());
    Ok(())
}

/// Deactivate a grant whose expiry has passed and audit it as a sweep.
async fn expire_in(conn: &mut PgConnection, grant: &mut TemporaryPermission) -> Result<(), sqlx::Error> {
    grant.is_active = false;
    grant.updated_utc = Utc::now();
    db::temporary_permissions::save_grant(&mut *conn, grant).await?;
    write_audit(
        conn,
        grant,
        AuditAction::Expired,
        None,
        Some("Expired".to_string()),
        json!({ "expired_utc": grant.expires_utc }),
    )
    .await
}

/// Issue a grant inside an open transaction.
///
/// A live grant for the same (user, permission) is a conflict. An active but
/// already expired one is swept first.
pub async fn issue_grant_in(conn: &mut PgConnection, new: NewGrant) -> ServiceResult<TemporaryPermission> {
    let permission = normalize_permission(&new.permission)
        .ok_or_else(|| ServiceError::Validation("Permission name must not be blank".into()))?;
    let now = Utc::now();
    if new.expires_utc <= now {
        return Err(ServiceError::Validation("expires_utc must be in the future".into()));
    }

    if !db::users::user_exists(&mut *conn, new.user_id).await? {
        return Err(ServiceError::not_found("User", new.user_id));
    }

    if let Some(mut current) =
        db::temporary_permissions::lock_active_grant(&mut *conn, new.user_id, &permission).await?
    {
        if current.is_live_at(now) {
            return Err(ServiceError::Conflict(format!(
                "User already holds an active temporary grant of '{}' until {}",
                permission, current.expires_utc
            )));
        }
        expire_in(conn, &mut current).await?;
    }

    let mut grant = TemporaryPermission::new(
        new.user_id,
        permission,
        new.granted_by,
        new.expires_utc,
        new.reason,
    );
    grant.source_request_id = new.source_request_id;
    db::temporary_permissions::insert_grant(&mut *conn, &grant).await?;

    let duration = humanize_duration(grant.expires_utc - grant.granted_utc);
    write_audit(
        conn,
        &grant,
        AuditAction::Granted,
        Some(grant.granted_by),
        Some(grant.reason.clone()),
        json!({
            "permission": grant.permission,
            "expires_utc": grant.expires_utc,
            "duration": duration,
            "source_request_id": grant.source_request_id,
        }),
    )
    .await?;

    refresh_in(conn, grant.user_id).await?;

    tracing::info!(
        temp_permission_id = %grant.temp_permission_id,
        user_id = %grant.user_id,
        permission = %grant.permission,
        duration = %duration,
        "Temporary permission granted"
    );
    Ok(grant)
}

/// The acting user's staff record, required for every ledger write.
async fn acting_staff(conn: &mut PgConnection, actor_user_id: Uuid) -> ServiceResult<StaffMember> {
    db::staff::find_staff_by_user(&mut *conn, actor_user_id)
        .await?
        .ok_or_else(|| ServiceError::Forbidden("Only staff members can manage temporary permissions".into()))
}

async fn lock_existing(conn: &mut PgConnection, id: Uuid) -> ServiceResult<TemporaryPermission> {
    db::temporary_permissions::lock_grant(&mut *conn, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Temporary permission", id))
}

#[derive(Clone)]
pub struct TemporaryPermissionService {
    pool: PgPool,
}

impl TemporaryPermissionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id, permission = %req.permission))]
    pub async fn create(
        &self,
        actor_user_id: Uuid,
        req: CreateTemporaryPermissionRequest,
    ) -> ServiceResult<TemporaryPermission> {
        let mut tx = self.pool.begin().await?;
        let grantor = acting_staff(&mut tx, actor_user_id).await?;
        ensure_any_in(&mut tx, actor_user_id, &[GRANT_TEMPORARY_PERMISSIONS, ADMIN]).await?;

        let grant = issue_grant_in(
            &mut tx,
            NewGrant {
                user_id: req.user_id,
                permission: req.permission,
                expires_utc: req.expires_utc,
                reason: req.reason,
                granted_by: grantor.staff_id,
                source_request_id: None,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(grant)
    }

    /// Move the expiry of an active grant strictly later.
    #[instrument(skip(self, req))]
    pub async fn extend(
        &self,
        actor_user_id: Uuid,
        id: Uuid,
        req: ExtendTemporaryPermissionRequest,
    ) -> ServiceResult<TemporaryPermission> {
        let mut tx = self.pool.begin().await?;
        let staff = acting_staff(&mut tx, actor_user_id).await?;
        ensure_any_in(&mut tx, actor_user_id, &[MANAGE_TEMPORARY_PERMISSIONS, ADMIN]).await?;

        let mut grant = lock_existing(&mut tx, id).await?;
        let now = Utc::now();
        if !grant.is_live_at(now) {
            return Err(ServiceError::Conflict("Only an active, unexpired grant can be extended".into()));
        }
        if req.expires_utc <= grant.expires_utc {
            return Err(ServiceError::Conflict(format!(
                "New expiry must be later than the current expiry {}",
                grant.expires_utc
            )));
        }

        let previous = grant.expires_utc;
        grant.expires_utc = req.expires_utc;
        grant.updated_utc = now;
        db::temporary_permissions::save_grant(&mut *tx, &grant).await?;

        write_audit(
            &mut tx,
            &grant,
            AuditAction::Extended,
            Some(staff.staff_id),
            Some(req.reason),
            json!({
                "previous_expires_utc": previous,
                "new_expires_utc": grant.expires_utc,
                "extended_by": humanize_duration(grant.expires_utc - previous),
            }),
        )
        .await?;
        refresh_in(&mut tx, grant.user_id).await?;
        tx.commit().await?;

        tracing::info!(temp_permission_id = %id, new_expires_utc = %grant.expires_utc, "Temporary permission extended");
        Ok(grant)
    }

    #[instrument(skip(self, req))]
    pub async fn revoke(
        &self,
        actor_user_id: Uuid,
        id: Uuid,
        req: RevokeTemporaryPermissionRequest,
    ) -> ServiceResult<TemporaryPermission> {
        let mut tx = self.pool.begin().await?;
        let staff = acting_staff(&mut tx, actor_user_id).await?;
        ensure_any_in(&mut tx, actor_user_id, &[MANAGE_TEMPORARY_PERMISSIONS, ADMIN]).await?;

        let mut grant = lock_existing(&mut tx, id).await?;
        if !grant.lifecycle().is_active() {
            return Err(ServiceError::Conflict("Temporary permission is not active".into()));
        }

        grant.is_active = false;
        grant.updated_utc = Utc::now();
        db::temporary_permissions::save_grant(&mut *tx, &grant).await?;
        write_audit(
            &mut tx,
            &grant,
            AuditAction::Revoked,
            Some(staff.staff_id),
            Some(req.reason),
            json!({ "remaining": humanize_duration(grant.expires_utc - grant.updated_utc) }),
        )
        .await?;
        refresh_in(&mut tx, grant.user_id).await?;
        tx.commit().await?;

        tracing::info!(temp_permission_id = %id, user_id = %grant.user_id, "Temporary permission revoked");
        Ok(grant)
    }

    /// Administrative edit of expiry, reason and active flag.
    #[instrument(skip(self, req))]
    pub async fn update(
        &self,
        actor_user_id: Uuid,
        id: Uuid,
        req: UpdateTemporaryPermissionRequest,
    ) -> ServiceResult<TemporaryPermission> {
        let mut tx = self.pool.begin().await?;
        let staff = acting_staff(&mut tx, actor_user_id).await?;
        ensure_any_in(&mut tx, actor_user_id, &[MANAGE_TEMPORARY_PERMISSIONS, ADMIN]).await?;

        let mut grant = lock_existing(&mut tx, id).await?;
        let now = Utc::now();
        let was_active = grant.is_active;
        let expiry_changed = req.expires_utc.is_some();

        if let Some(expires_utc) = req.expires_utc {
            if grant.is_active && grant.expires_utc <= now {
                return Err(ServiceError::Conflict(
                    "Grant has already expired; issue a new grant instead".into(),
                ));
            }
            if expires_utc <= grant.expires_utc {
                return Err(ServiceError::Conflict(format!(
                    "New expiry must be later than the current expiry {}",
                    grant.expires_utc
                )));
            }
            let previous = grant.expires_utc;
            grant.expires_utc = expires_utc;
            write_audit(
                &mut tx,
                &grant,
                AuditAction::Extended,
                Some(staff.staff_id),
                req.reason.clone(),
                json!({
                    "previous_expires_utc": previous,
                    "new_expires_utc": expires_utc,
                    "extended_by": humanize_duration(expires_utc - previous),
                }),
            )
            .await?;
        }
        if let Some(reason) = &req.reason {
            grant.reason = reason.clone();
        }

        match req.is_active {
            Some(true) if !was_active => {
                if grant.expires_utc <= now {
                    return Err(ServiceError::Conflict("Cannot activate an expired grant".into()));
                }
                if let Some(other) =
                    db::temporary_permissions::lock_active_grant(&mut *tx, grant.user_id, &grant.permission).await?
                {
                    return Err(ServiceError::Conflict(format!(
                        "Grant {} is already active for this user and permission",
                        other.temp_permission_id
                    )));
                }
                grant.is_active = true;
                write_audit(&mut tx, &grant, AuditAction::Activated, Some(staff.staff_id), req.reason.clone(), json!({})).await?;
            }
            Some(false) if was_active => {
                grant.is_active = false;
                write_audit(&mut tx, &grant, AuditAction::Deactivated, Some(staff.staff_id), req.reason.clone(), json!({})).await?;
            }
            _ => {}
        }

        grant.updated_utc = now;
        db::temporary_permissions::save_grant(&mut *tx, &grant).await?;
        if was_active != grant.is_active || expiry_changed {
            refresh_in(&mut tx, grant.user_id).await?;
        }
        tx.commit().await?;

        tracing::info!(temp_permission_id = %id, is_active = grant.is_active, "Temporary permission updated");
        Ok(grant)
    }

    /// Hard delete; the audit trail goes with the grant.
    #[instrument(skip(self))]
    pub async fn delete(&self, actor_user_id: Uuid, id: Uuid) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        acting_staff(&mut tx, actor_user_id).await?;
        ensure_any_in(&mut tx, actor_user_id, &[MANAGE_TEMPORARY_PERMISSIONS, ADMIN]).await?;

        let grant = lock_existing(&mut tx, id).await?;
        db::temporary_permissions::delete_grant(&mut *tx, id).await?;
        if grant.is_active {
            refresh_in(&mut tx, grant.user_id).await?;
        }
        tx.commit().await?;

        metrics::record_grant_event("deleted");
        tracing::info!(temp_permission_id = %id, user_id = %grant.user_id, "Temporary permission deleted");
        Ok(())
    }

    /// Deactivate every active grant whose expiry has passed. Running it again
    /// right away changes nothing.
    #[instrument(skip(self))]
    pub async fn cleanup_expired_permissions(&self) -> ServiceResult<CleanupSummary> {
        let mut tx = self.pool.begin().await?;
        let expired = db::temporary_permissions::lock_expired_active(&mut *tx).await?;

        let mut users: Vec<Uuid> = Vec::new();
        for mut grant in expired.iter().cloned() {
            expire_in(&mut tx, &mut grant).await?;
            if !users.contains(&grant.user_id) {
                users.push(grant.user_id);
            }
        }
        for user_id in &users {
            refresh_in(&mut tx, *user_id).await?;
        }
        tx.commit().await?;

        metrics::record_cleanup("temporary_permissions", expired.len() as u64);
        if !expired.is_empty() {
            tracing::info!(deactivated = expired.len(), affected_users = users.len(), "Expired temporary permissions swept");
        }

        Ok(CleanupSummary {
            deactivated: expired.len(),
            affected_users: users.len(),
        })
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<TemporaryPermission> {
        db::temporary_permissions::find_grant(&self.pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Temporary permission", id))
    }

    pub async fn list(&self, mut filter: GrantFilter) -> ServiceResult<Vec<TemporaryPermission>> {
        filter.limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        filter.offset = filter.offset.max(0);
        Ok(db::temporary_permissions::list_grants(&self.pool, &filter).await?)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<TemporaryPermission>> {
        self.list(GrantFilter {
            user_id: Some(user_id),
            limit: MAX_PAGE_SIZE,
            ..Default::default()
        })
        .await
    }

    pub async fn audit_trail(&self, id: Uuid) -> ServiceResult<Vec<PermissionAuditEntry>> {
        self.get(id).await?;
        Ok(db::audit::list_for_grant(&self.pool, id).await?)
    }

    /// Live grants expiring within the next `within_hours`.
    pub async fn expiring(&self, within_hours: i64) -> ServiceResult<Vec<TemporaryPermission>> {
        let until = expiry_horizon(Utc::now(), within_hours)?;
        Ok(db::temporary_permissions::list_expiring(&self.pool, until).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_horizon_adds_window() {
        let now = Utc::now();
        assert_eq!(expiry_horizon(now, 24).unwrap(), now + Duration::hours(24));
    }

    #[test]
    fn expiry_horizon_treats_negative_as_empty() {
        let now = Utc::now();
        assert_eq!(expiry_horizon(now, -5).unwrap(), now);
    }

    #[test]
    fn expiry_horizon_rejects_overflowing_windows() {
        let now = Utc::now();
        assert!(matches!(
            expiry_horizon(now, 3_000_000_000),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            expiry_horizon(now, 1_000_000_000_000_000),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            expiry_horizon(now, i64::MAX),
            Err(ServiceError::Validation(_))
        ));
    }
}
