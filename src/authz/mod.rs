//! Role and permission checks for authenticated users.
//!
//! A user's access is captured in an [`AccessProfile`]: the names of the
//! roles assigned to them and the union of the permissions those roles
//! grant. Checks are pure reads over the profile; the profile itself is
//! loaded through an [`RbacStore`].

pub mod provision;
pub mod store;

pub use provision::{provision_defaults, seed_default_users};
pub use store::{PermissionSeed, RbacStore, RoleGrant, RoleSeed, UserSeed};

use std::collections::BTreeSet;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("{entity} {id} does not exist")]
    Referential { entity: &'static str, id: Uuid },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

/// Snapshot of one user's role memberships and effective permissions.
///
/// Loaded once per request and passed explicitly into every check, so the
/// checks stay pure and testable without any ambient session state.
#[derive(Debug, Clone, Default)]
pub struct AccessProfile {
    role_names: BTreeSet<String>,
    permissions: BTreeSet<String>,
}

impl AccessProfile {
    /// Builds a profile from the role grants assigned to a user. Permissions
    /// granted by more than one role collapse into a single entry.
    pub fn from_grants(grants: Vec<RoleGrant>) -> Self {
        let mut role_names = BTreeSet::new();
        let mut permissions = BTreeSet::new();
        for grant in grants {
            role_names.insert(grant.role_name);
            permissions.extend(grant.permission_names);
        }
        Self {
            role_names,
            permissions,
        }
    }

    pub async fn load<S>(store: &S, user_id: Uuid) -> Result<Self, AuthzError>
    where
        S: RbacStore + ?Sized,
    {
        Ok(Self::from_grants(store.role_grants(user_id).await?))
    }

    /// Exact, case-sensitive role name match. Unknown names are `false`,
    /// never an error.
    pub fn has_role(&self, role_name: &str) -> bool {
        self.role_names.contains(role_name)
    }

    /// True when at least one of the given role names is assigned.
    pub fn has_any_role<'a, I>(&self, role_names: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        role_names.into_iter().any(|name| self.has_role(name))
    }

    /// True when any assigned role grants the named permission.
    pub fn has_permission(&self, permission_name: &str) -> bool {
        self.permissions.contains(permission_name)
    }

    pub fn role_names(&self) -> &BTreeSet<String> {
        &self.role_names
    }

    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(role: &str, permissions: &[&str]) -> RoleGrant {
        RoleGrant {
            role_name: role.to_string(),
            permission_names: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn permissions_union_over_roles() {
        let profile = AccessProfile::from_grants(vec![
            grant("moderator", &["view_dashboard", "manage_users", "view_analytics"]),
            grant("user", &["view_dashboard"]),
        ]);

        assert!(profile.has_permission("view_analytics"));
        assert!(profile.has_permission("view_dashboard"));
        assert_eq!(profile.permissions().len(), 3);
    }

    #[test]
    fn no_roles_means_no_permissions() {
        let profile = AccessProfile::from_grants(vec![]);

        assert!(!profile.has_permission("view_dashboard"));
        assert!(profile.permissions().is_empty());
        assert!(profile.role_names().is_empty());
    }

    #[test]
    fn role_match_is_case_sensitive() {
        let profile = AccessProfile::from_grants(vec![grant("admin", &[])]);

        assert!(profile.has_role("admin"));
        assert!(!profile.has_role("Admin"));
        assert!(!profile.has_role("ADMIN"));
    }

    #[test]
    fn has_any_role_checks_intersection() {
        let profile = AccessProfile::from_grants(vec![grant("moderator", &[])]);

        assert!(profile.has_any_role(["admin", "moderator"]));
        assert!(!profile.has_any_role(["admin", "user"]));
        assert!(!profile.has_any_role([]));
    }

    #[test]
    fn role_without_permissions_still_counts_as_membership() {
        let profile = AccessProfile::from_grants(vec![grant("auditor", &[])]);

        assert!(profile.has_role("auditor"));
        assert!(profile.permissions().is_empty());
    }
}
