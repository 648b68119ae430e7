//! Role CRUD and the staff role assignment ledger.

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::db;
use crate::dtos::roles::{AssignRoleRequest, CreateRoleRequest, UpdateRoleRequest};
use crate::models::permission::normalize_permission;
use crate::models::role::normalize_role_code;
use crate::models::{AssignmentDetail, Role, StaffRoleAssignment};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::resolution::refresh_in;

/// Trim, reject blanks and drop duplicates while keeping first-seen order.
pub fn normalize_permission_list(raw: &[String]) -> ServiceResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for entry in raw {
        let permission = normalize_permission(entry).ok_or_else(|| {
            ServiceError::Validation(format!("Invalid permission name '{}'", entry))
        })?;
        if !out.contains(&permission) {
            out.push(permission);
        }
    }
    Ok(out)
}

#[derive(Clone)]
pub struct RoleService {
    pool: PgPool,
}

impl RoleService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, req), fields(role_code = %req.role_code))]
    pub async fn create_role(&self, req: CreateRoleRequest) -> ServiceResult<Role> {
        let permissions = normalize_permission_list(&req.permissions)?;
        let role = Role::new(req.role_name, &req.role_code, req.description, permissions);

        if db::roles::find_name_or_code_clash(&self.pool, &role.role_name, &role.role_code, None)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "A role named '{}' or coded '{}' already exists",
                role.role_name, role.role_code
            )));
        }

        db::roles::insert_role(&self.pool, &role).await?;
        tracing::info!(role_id = %role.role_id, role_code = %role.role_code, "Role created");
        Ok(role)
    }

    pub async fn get_role(&self, role_id: Uuid) -> ServiceResult<Role> {
        db::roles::find_role_by_id(&self.pool, role_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", role_id))
    }

    pub async fn list_roles(&self, active_only: bool) -> ServiceResult<Vec<Role>> {
        Ok(db::roles::list_roles(&self.pool, active_only).await?)
    }

    /// Apply a partial update. Holders of the role are refreshed when its
    /// permission list or active flag changes.
    #[instrument(skip(self, req))]
    pub async fn update_role(&self, role_id: Uuid, req: UpdateRoleRequest) -> ServiceResult<Role> {
        let mut tx = self.pool.begin().await?;
        let mut role = db::roles::lock_role(&mut *tx, role_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", role_id))?;

        if let Some(name) = req.role_name {
            role.role_name = name.trim().to_string();
        }
        if let Some(code) = req.role_code {
            role.role_code = normalize_role_code(&code);
        }
        if req.description.is_some() {
            role.description = req.description;
        }

        let mut affects_holders = false;
        if let Some(permissions) = req.permissions {
            let permissions = normalize_permission_list(&permissions)?;
            affects_holders |= permissions != role.permissions;
            role.permissions = permissions;
        }
        if let Some(is_active) = req.is_active {
            affects_holders |= is_active != role.is_active;
            role.is_active = is_active;
        }

        if db::roles::find_name_or_code_clash(&mut *tx, &role.role_name, &role.role_code, Some(role_id))
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Another role already uses the name '{}' or code '{}'",
                role.role_name, role.role_code
            )));
        }

        role.updated_utc = chrono::Utc::now();
        db::roles::update_role(&mut *tx, &role).await?;

        if affects_holders {
            let holders = db::users::user_ids_holding_role(&mut *tx, role_id).await?;
            for user_id in &holders {
                refresh_in(&mut tx, *user_id).await?;
            }
            tracing::info!(role_id = %role_id, refreshed_users = holders.len(), "Role holders refreshed");
        }

        tx.commit().await?;
        tracing::info!(role_id = %role_id, "Role updated");
        Ok(role)
    }

    /// Delete a role nobody actively holds. Historical inactive assignments
    /// go with it.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, role_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        db::roles::lock_role(&mut *tx, role_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", role_id))?;

        let active = db::roles::count_active_assignments(&mut *tx, role_id).await?;
        if active > 0 {
            tracing::warn!(role_id = %role_id, active_assignments = active, "Role still in use");
            return Err(ServiceError::Conflict(format!(
                "Role is still assigned to {} staff member(s)",
                active
            )));
        }

        db::roles::delete_inactive_assignments(&mut *tx, role_id).await?;
        db::roles::delete_role(&mut *tx, role_id).await?;
        tx.commit().await?;

        tracing::info!(role_id = %role_id, "Role deleted");
        Ok(())
    }

    /// Assign a role to a staff member at a scope. An inactive row for the same
    /// key is reactivated in place.
    #[instrument(skip(self, req), fields(role_id = %req.role_id, scope = %req.scope))]
    pub async fn assign_role_to_staff(
        &self,
        staff_id: Uuid,
        req: AssignRoleRequest,
        assigned_by_user: Option<Uuid>,
    ) -> ServiceResult<StaffRoleAssignment> {
        let scope_id = if req.scope.requires_scope_id() {
            Some(req.scope_id.ok_or_else(|| {
                ServiceError::Validation(format!("scope_id is required for {} scope", req.scope))
            })?)
        } else {
            None
        };
        if req.expires_utc.is_some_and(|exp| exp <= chrono::Utc::now()) {
            return Err(ServiceError::Validation("expires_utc must be in the future".into()));
        }

        let mut tx = self.pool.begin().await?;

        let staff = db::staff::find_staff(&mut *tx, staff_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Staff member", staff_id))?;
        let role = db::roles::find_role_by_id(&mut *tx, req.role_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", req.role_id))?;
        if !role.is_active {
            return Err(ServiceError::Validation(format!(
                "Role '{}' is inactive",
                role.role_code
            )));
        }

        let assigned_by = match assigned_by_user {
            Some(user_id) => db::staff::find_staff_by_user(&mut *tx, user_id)
                .await?
                .map(|s| s.staff_id),
            None => None,
        };

        let existing =
            db::assignments::lock_by_key(&mut *tx, staff_id, role.role_id, req.scope, scope_id).await?;

        let assignment = match existing {
            Some(mut row) => {
                if !row.reactivate(req.conditions, req.expires_utc, assigned_by) {
                    return Err(ServiceError::Conflict(format!(
                        "Role '{}' is already assigned to this staff member at {} scope",
                        role.role_code, req.scope
                    )));
                }
                db::assignments::save_assignment(&mut *tx, &row).await?;
                tracing::info!(assignment_id = %row.assignment_id, "Role assignment reactivated");
                row
            }
            None => {
                let mut row =
                    StaffRoleAssignment::new(staff_id, role.role_id, req.scope, scope_id, assigned_by);
                row.conditions = req.conditions;
                row.expires_utc = req.expires_utc;
                db::assignments::insert_assignment(&mut *tx, &row).await?;
                tracing::info!(assignment_id = %row.assignment_id, "Role assigned");
                row
            }
        };

        refresh_in(&mut tx, staff.user_id).await?;
        tx.commit().await?;
        Ok(assignment)
    }

    /// Deactivate the active assignment(s) of a role to a staff member.
    #[instrument(skip(self))]
    pub async fn remove_role_from_staff(&self, staff_id: Uuid, role_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        let staff = db::staff::find_staff(&mut *tx, staff_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Staff member", staff_id))?;

        let removed = db::assignments::deactivate_for_pair(&mut *tx, staff_id, role_id).await?;
        if removed == 0 {
            return Err(ServiceError::NotFound(format!(
                "No active assignment of role {} for staff member {}",
                role_id, staff_id
            )));
        }

        refresh_in(&mut tx, staff.user_id).await?;
        tx.commit().await?;

        tracing::info!(staff_id = %staff_id, role_id = %role_id, removed, "Role removed from staff");
        Ok(())
    }

    pub async fn get_staff_roles(&self, staff_id: Uuid) -> ServiceResult<Vec<AssignmentDetail>> {
        if db::staff::find_staff(&self.pool, staff_id).await?.is_none() {
            return Err(ServiceError::not_found("Staff member", staff_id));
        }
        Ok(db::assignments::list_active_for_staff(&self.pool, staff_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_list_is_trimmed_and_deduplicated() {
        let raw = vec![
            " view_reports".to_string(),
            "edit_notes".to_string(),
            "view_reports ".to_string(),
        ];
        assert_eq!(
            normalize_permission_list(&raw).unwrap(),
            vec!["view_reports".to_string(), "edit_notes".to_string()]
        );
    }

    #[test]
    fn blank_permission_is_rejected() {
        let raw = vec!["view_reports".to_string(), "  ".to_string()];
        assert!(matches!(
            normalize_permission_list(&raw),
            Err(ServiceError::Validation(_))
        ));
    }
}
