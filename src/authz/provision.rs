//! Idempotent provisioning of the canonical role/permission graph.

use super::store::{PermissionSeed, RbacStore, RoleSeed, UserSeed};
use super::AuthzError;
use crate::utils::hash_password;

pub const DEFAULT_PERMISSIONS: &[PermissionSeed] = &[
    PermissionSeed {
        name: "view_dashboard",
        display_name: "View Dashboard",
        description: "Can view the dashboard",
    },
    PermissionSeed {
        name: "manage_users",
        display_name: "Manage Users",
        description: "Can create, edit, and delete users",
    },
    PermissionSeed {
        name: "manage_roles",
        display_name: "Manage Roles",
        description: "Can manage roles and permissions",
    },
    PermissionSeed {
        name: "view_analytics",
        display_name: "View Analytics",
        description: "Can view analytics and reports",
    },
    PermissionSeed {
        name: "system_settings",
        display_name: "System Settings",
        description: "Can modify system settings",
    },
];

/// Which permissions a canonical role is granted.
#[derive(Debug, Clone, Copy)]
pub enum DefaultGrant {
    /// Every permission that exists at provisioning time.
    All,
    /// Exactly the named permissions.
    Named(&'static [&'static str]),
}

#[derive(Debug, Clone)]
pub struct DefaultRole {
    pub role: RoleSeed,
    pub grants: DefaultGrant,
}

pub const DEFAULT_ROLES: &[DefaultRole] = &[
    DefaultRole {
        role: RoleSeed {
            name: "admin",
            display_name: "Administrator",
            description: "Full system access",
        },
        grants: DefaultGrant::All,
    },
    DefaultRole {
        role: RoleSeed {
            name: "moderator",
            display_name: "Moderator",
            description: "Limited administrative access",
        },
        grants: DefaultGrant::Named(&["view_dashboard", "manage_users", "view_analytics"]),
    },
    DefaultRole {
        role: RoleSeed {
            name: "user",
            display_name: "User",
            description: "Standard user access",
        },
        grants: DefaultGrant::Named(&["view_dashboard"]),
    },
];

/// Ensures the canonical permissions and roles exist exactly once and that
/// each role's permission set matches its canonical grant.
///
/// Safe to re-run: entities are looked up by unique name before creation,
/// and each role's permissions are re-synchronized with a full replace, so a
/// manually altered role is restored on the next run.
pub async fn provision_defaults<S>(store: &S) -> Result<(), AuthzError>
where
    S: RbacStore + ?Sized,
{
    for seed in DEFAULT_PERMISSIONS {
        if store.permission_id_by_name(seed.name).await?.is_none() {
            store.create_permission(seed).await?;
            log::info!("created permission {}", seed.name);
        }
    }

    for default_role in DEFAULT_ROLES {
        let role_id = match store.role_id_by_name(default_role.role.name).await? {
            Some(id) => id,
            None => {
                let id = store.create_role(&default_role.role).await?;
                log::info!("created role {}", default_role.role.name);
                id
            }
        };

        let permission_ids = match default_role.grants {
            DefaultGrant::All => store.all_permission_ids().await?,
            DefaultGrant::Named(names) => {
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    if let Some(id) = store.permission_id_by_name(name).await? {
                        ids.push(id);
                    }
                }
                ids
            }
        };

        store
            .replace_role_permissions(role_id, &permission_ids)
            .await?;
    }

    Ok(())
}

struct DefaultUser {
    name: &'static str,
    email: &'static str,
    bio: &'static str,
    role: &'static str,
}

const DEFAULT_USERS: &[DefaultUser] = &[
    DefaultUser {
        name: "Administrator",
        email: "admin@example.com",
        bio: "System Administrator",
        role: "admin",
    },
    DefaultUser {
        name: "Moderator",
        email: "moderator@example.com",
        bio: "System Moderator",
        role: "moderator",
    },
    DefaultUser {
        name: "Regular User",
        email: "user@example.com",
        bio: "Regular system user",
        role: "user",
    },
];

const DEFAULT_USER_PASSWORD: &str = "password";

/// Creates the demo accounts (create-if-absent by email) and syncs each to
/// its single canonical role. Intended for development environments only.
pub async fn seed_default_users<S>(store: &S) -> Result<(), AuthzError>
where
    S: RbacStore + ?Sized,
{
    for seed in DEFAULT_USERS {
        let user_id = match store.user_id_by_email(seed.email).await? {
            Some(id) => id,
            None => {
                let password_hash = hash_password(DEFAULT_USER_PASSWORD)?;
                let id = store
                    .create_user(&UserSeed {
                        name: seed.name,
                        email: seed.email,
                        password_hash,
                        bio: seed.bio,
                    })
                    .await?;
                log::info!("created default user {}", seed.email);
                id
            }
        };

        if let Some(role_id) = store.role_id_by_name(seed.role).await? {
            store.replace_user_roles(user_id, &[role_id]).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn permission_catalog_names_are_unique() {
        let names: BTreeSet<_> = DEFAULT_PERMISSIONS.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), DEFAULT_PERMISSIONS.len());
        assert_eq!(DEFAULT_PERMISSIONS.len(), 5);
    }

    #[test]
    fn moderator_grant_is_exact() {
        let moderator = DEFAULT_ROLES
            .iter()
            .find(|r| r.role.name == "moderator")
            .unwrap();
        match moderator.grants {
            DefaultGrant::Named(names) => {
                assert_eq!(names, ["view_dashboard", "manage_users", "view_analytics"]);
            }
            DefaultGrant::All => panic!("moderator must not receive all permissions"),
        }
    }

    #[test]
    fn user_role_grants_dashboard_only() {
        let user = DEFAULT_ROLES.iter().find(|r| r.role.name == "user").unwrap();
        match user.grants {
            DefaultGrant::Named(names) => assert_eq!(names, ["view_dashboard"]),
            DefaultGrant::All => panic!("user must not receive all permissions"),
        }
    }

    #[test]
    fn admin_receives_all_permissions() {
        let admin = DEFAULT_ROLES
            .iter()
            .find(|r| r.role.name == "admin")
            .unwrap();
        assert!(matches!(admin.grants, DefaultGrant::All));
    }
}
