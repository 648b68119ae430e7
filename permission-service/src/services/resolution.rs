//! Effective permission resolution.
//!
//! The effective set of a user is the union of role permissions (active role,
//! active and unexpired assignment), the direct override list and live
//! temporary grants. It is cached on `users.effective_permissions`; every
//! writer of those sources calls [`refresh_in`] inside its own transaction.
//!
//! The cache is written for readers outside this service. Guards and reads
//! here always recompute from the sources, because a grant whose expiry has
//! passed stays in the cache until the next sweep.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::db;
use crate::models::permission::normalize_permission;
use crate::models::{EffectivePermissions, PermissionSources};
use crate::services::error::{ServiceError, ServiceResult};

/// Load every permission source of a user. An unknown user has none.
pub async fn load_sources(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<PermissionSources, sqlx::Error> {
    let Some(user) = db::users::find_user(&mut *conn, user_id).await? else {
        return Ok(PermissionSources::default());
    };

    let role = db::users::role_permissions_for_user(&mut *conn, user_id).await?;
    let temporary = db::temporary_permissions::live_permissions_for_user(&mut *conn, user_id).await?;

    Ok(PermissionSources {
        role: role.into_iter().collect(),
        direct: user.direct_permissions.into_iter().collect(),
        temporary: temporary.into_iter().collect(),
    })
}

/// Recompute and persist the cached effective set of a user.
pub async fn refresh_in(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<EffectivePermissions, sqlx::Error> {
    let effective = load_sources(conn, user_id).await?.effective();
    let updated = db::users::set_effective_permissions(&mut *conn, user_id, &effective.to_vec()).await?;
    if updated {
        tracing::debug!(user_id = %user_id, count = effective.len(), "Effective permissions refreshed");
    }
    Ok(effective)
}

/// Fail with `Forbidden` unless the user holds one of `permissions`.
pub async fn ensure_any_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    permissions: &[&str],
) -> ServiceResult<()> {
    let effective = load_sources(conn, user_id).await?.effective();
    if effective.contains_any(permissions) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user_id, required = ?permissions, "Permission denied");
        Err(ServiceError::Forbidden(format!(
            "Requires one of: {}",
            permissions.join(", ")
        )))
    }
}

#[derive(Clone)]
pub struct PermissionResolver {
    pool: PgPool,
}

impl PermissionResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current effective set, computed from the sources rather than the cache.
    #[instrument(skip(self))]
    pub async fn get_user_permissions(&self, user_id: Uuid) -> ServiceResult<EffectivePermissions> {
        Ok(self.get_permission_sources(user_id).await?.effective())
    }

    pub async fn get_permission_sources(&self, user_id: Uuid) -> ServiceResult<PermissionSources> {
        let mut conn = self.pool.acquire().await?;
        Ok(load_sources(&mut conn, user_id).await?)
    }

    pub async fn has_permission(&self, user_id: Uuid, permission: &str) -> ServiceResult<bool> {
        Ok(self.get_user_permissions(user_id).await?.contains(permission))
    }

    pub async fn has_any_permission<S: AsRef<str>>(
        &self,
        user_id: Uuid,
        permissions: &[S],
    ) -> ServiceResult<bool> {
        Ok(self.get_user_permissions(user_id).await?.contains_any(permissions))
    }

    pub async fn has_all_permissions<S: AsRef<str>>(
        &self,
        user_id: Uuid,
        permissions: &[S],
    ) -> ServiceResult<bool> {
        Ok(self.get_user_permissions(user_id).await?.contains_all(permissions))
    }

    #[instrument(skip(self))]
    pub async fn refresh_user_permissions(&self, user_id: Uuid) -> ServiceResult<EffectivePermissions> {
        let mut tx = self.pool.begin().await?;
        if !db::users::user_exists(&mut *tx, user_id).await? {
            return Err(ServiceError::not_found("User", user_id));
        }
        let effective = refresh_in(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(effective)
    }

    /// Add a direct override. Adding one that is already present changes nothing.
    #[instrument(skip(self))]
    pub async fn add_user_permission(
        &self,
        user_id: Uuid,
        permission: &str,
    ) -> ServiceResult<EffectivePermissions> {
        let permission = normalize_permission(permission)
            .ok_or_else(|| ServiceError::Validation("Permission name must not be blank".into()))?;

        let mut tx = self.pool.begin().await?;
        let user = db::users::lock_user(&mut *tx, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;

        let mut direct = user.direct_permissions;
        if !direct.contains(&permission) {
            direct.push(permission.clone());
            db::users::set_direct_permissions(&mut *tx, user_id, &direct).await?;
            tracing::info!(user_id = %user_id, permission = %permission, "Direct permission added");
        }

        let effective = refresh_in(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(effective)
    }

    /// Remove a direct override. Removing an absent one changes nothing.
    #[instrument(skip(self))]
    pub async fn remove_user_permission(
        &self,
        user_id: Uuid,
        permission: &str,
    ) -> ServiceResult<EffectivePermissions> {
        let mut tx = self.pool.begin().await?;
        let user = db::users::lock_user(&mut *tx, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;

        let before = user.direct_permissions.len();
        let direct: Vec<String> = user
            .direct_permissions
            .into_iter()
            .filter(|p| p != permission)
            .collect();
        if direct.len() != before {
            db::users::set_direct_permissions(&mut *tx, user_id, &direct).await?;
            tracing::info!(user_id = %user_id, permission = %permission, "Direct permission removed");
        }

        let effective = refresh_in(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(effective)
    }
}
