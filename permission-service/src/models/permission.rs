//! Permission names and the effective permission set.
//!
//! Permissions are free-form strings. The `admin` sentinel is never stored
//! next to other entries in a resolved set: [`EffectivePermissions::All`]
//! replaces the whole set instead.

use std::collections::BTreeSet;

/// Sentinel meaning "every permission".
pub const ADMIN: &str = "admin";

pub const VIEW_ROLES: &str = "view_roles";
pub const MANAGE_ROLES: &str = "manage_roles";
pub const ASSIGN_ROLES: &str = "assign_roles";

pub const GRANT_TEMPORARY_PERMISSIONS: &str = "grant_temporary_permissions";
pub const MANAGE_TEMPORARY_PERMISSIONS: &str = "manage_temporary_permissions";
pub const VIEW_TEMPORARY_PERMISSIONS: &str = "view_temporary_permissions";

pub const APPROVE_PERMISSION_REQUESTS: &str = "approve_permission_requests";
pub const VIEW_PERMISSION_REQUESTS: &str = "view_permission_requests";
pub const MANAGE_PERMISSION_REQUESTS: &str = "manage_permission_requests";
pub const DELETE_PERMISSION_REQUESTS: &str = "delete_permission_requests";

pub const VIEW_USER_PERMISSIONS: &str = "view_user_permissions";
pub const MANAGE_USER_PERMISSIONS: &str = "manage_user_permissions";

pub const VIEW_PERMISSION_ANALYTICS: &str = "view_permission_analytics";

/// Trim a permission name, rejecting blanks and embedded whitespace.
pub fn normalize_permission(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Resolved permission set of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectivePermissions {
    /// The user holds `admin`; every check passes.
    All,
    Specific(BTreeSet<String>),
}

impl Default for EffectivePermissions {
    fn default() -> Self {
        EffectivePermissions::Specific(BTreeSet::new())
    }
}

impl EffectivePermissions {
    /// Union every source, collapsing to [`EffectivePermissions::All`] when
    /// `admin` appears anywhere.
    pub fn from_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for permission in sources {
            let permission = permission.as_ref();
            if permission == ADMIN {
                return EffectivePermissions::All;
            }
            set.insert(permission.to_string());
        }
        EffectivePermissions::Specific(set)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, EffectivePermissions::All)
    }

    pub fn contains(&self, permission: &str) -> bool {
        match self {
            EffectivePermissions::All => true,
            EffectivePermissions::Specific(set) => set.contains(permission),
        }
    }

    /// True when at least one of `permissions` is held. An empty list never matches.
    pub fn contains_any<S: AsRef<str>>(&self, permissions: &[S]) -> bool {
        match self {
            EffectivePermissions::All => true,
            EffectivePermissions::Specific(set) => {
                permissions.iter().any(|p| set.contains(p.as_ref()))
            }
        }
    }

    /// True when every one of `permissions` is held.
    pub fn contains_all<S: AsRef<str>>(&self, permissions: &[S]) -> bool {
        match self {
            EffectivePermissions::All => true,
            EffectivePermissions::Specific(set) => {
                permissions.iter().all(|p| set.contains(p.as_ref()))
            }
        }
    }

    /// Flat representation stored in `users.effective_permissions`.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            EffectivePermissions::All => vec![ADMIN.to_string()],
            EffectivePermissions::Specific(set) => set.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EffectivePermissions::All => 1,
            EffectivePermissions::Specific(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EffectivePermissions::Specific(set) if set.is_empty())
    }
}

/// Where a user's permissions come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSources {
    pub role: BTreeSet<String>,
    pub direct: BTreeSet<String>,
    pub temporary: BTreeSet<String>,
}

impl PermissionSources {
    pub fn effective(&self) -> EffectivePermissions {
        EffectivePermissions::from_sources(
            self.role
                .iter()
                .chain(self.direct.iter())
                .chain(self.temporary.iter()),
        )
    }
}
