//! Persistence seam for the authorization model.
//!
//! [`RbacStore`] is implemented for the Postgres pool here and by an
//! in-memory store in the integration tests. Replace operations discard the
//! prior association set entirely; a referential failure leaves it
//! untouched.

use async_trait::async_trait;
use uuid::Uuid;

use super::AuthzError;
use crate::database::Database;

/// One assigned role together with the permission names it grants.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoleGrant {
    pub role_name: String,
    pub permission_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PermissionSeed {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct RoleSeed {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct UserSeed {
    pub name: &'static str,
    pub email: &'static str,
    pub password_hash: String,
    pub bio: &'static str,
}

#[async_trait]
pub trait RbacStore: Send + Sync {
    /// Role name plus granted permission names, for every role assigned to
    /// the user. A user with no roles yields an empty list.
    async fn role_grants(&self, user_id: Uuid) -> Result<Vec<RoleGrant>, AuthzError>;

    async fn permission_id_by_name(&self, name: &str) -> Result<Option<Uuid>, AuthzError>;

    async fn role_id_by_name(&self, name: &str) -> Result<Option<Uuid>, AuthzError>;

    async fn user_id_by_email(&self, email: &str) -> Result<Option<Uuid>, AuthzError>;

    async fn all_permission_ids(&self) -> Result<Vec<Uuid>, AuthzError>;

    async fn create_permission(&self, seed: &PermissionSeed) -> Result<Uuid, AuthzError>;

    async fn create_role(&self, seed: &RoleSeed) -> Result<Uuid, AuthzError>;

    async fn create_user(&self, seed: &UserSeed) -> Result<Uuid, AuthzError>;

    /// Atomically replaces the role's permission set with `permission_ids`.
    /// Fails with [`AuthzError::Referential`] if the role or any permission
    /// id does not exist, leaving the prior set unchanged.
    async fn replace_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), AuthzError>;

    /// Atomically replaces the user's role set with `role_ids`. Same
    /// referential contract as [`Self::replace_role_permissions`].
    async fn replace_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), AuthzError>;
}

#[async_trait]
impl RbacStore for Database {
    async fn role_grants(&self, user_id: Uuid) -> Result<Vec<RoleGrant>, AuthzError> {
        let grants = sqlx::query_as::<_, RoleGrant>(
            r#"
            SELECT r.name AS role_name,
                   COALESCE(
                       array_agg(p.name ORDER BY p.name) FILTER (WHERE p.name IS NOT NULL),
                       '{}'
                   ) AS permission_names
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
            GROUP BY r.id, r.name
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(self)
        .await?;

        Ok(grants)
    }

    async fn permission_id_by_name(&self, name: &str) -> Result<Option<Uuid>, AuthzError> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM permissions WHERE name = $1")
            .bind(name)
            .fetch_optional(self)
            .await?;
        Ok(id)
    }

    async fn role_id_by_name(&self, name: &str) -> Result<Option<Uuid>, AuthzError> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(self)
            .await?;
        Ok(id)
    }

    async fn user_id_by_email(&self, email: &str) -> Result<Option<Uuid>, AuthzError> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self)
            .await?;
        Ok(id)
    }

    async fn all_permission_ids(&self) -> Result<Vec<Uuid>, AuthzError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM permissions ORDER BY name")
            .fetch_all(self)
            .await?;
        Ok(ids)
    }

    async fn create_permission(&self, seed: &PermissionSeed) -> Result<Uuid, AuthzError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO permissions (name, display_name, description)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(seed.name)
        .bind(seed.display_name)
        .bind(seed.description)
        .fetch_one(self)
        .await?;
        Ok(id)
    }

    async fn create_role(&self, seed: &RoleSeed) -> Result<Uuid, AuthzError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO roles (name, display_name, description)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(seed.name)
        .bind(seed.display_name)
        .bind(seed.description)
        .fetch_one(self)
        .await?;
        Ok(id)
    }

    async fn create_user(&self, seed: &UserSeed) -> Result<Uuid, AuthzError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (email, password_hash, name, bio, is_active)
            VALUES ($1, $2, $3, $4, true)
            RETURNING id
            "#,
        )
        .bind(seed.email)
        .bind(&seed.password_hash)
        .bind(seed.name)
        .bind(seed.bio)
        .fetch_one(self)
        .await?;
        Ok(id)
    }

    async fn replace_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), AuthzError> {
        let mut tx = self.begin().await?;

        let role_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1)")
                .bind(role_id)
                .fetch_one(&mut *tx)
                .await?;
        if !role_exists {
            return Err(AuthzError::Referential {
                entity: "role",
                id: role_id,
            });
        }

        for permission_id in permission_ids {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM permissions WHERE id = $1)")
                    .bind(permission_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AuthzError::Referential {
                    entity: "permission",
                    id: *permission_id,
                });
            }
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for permission_id in permission_ids {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), AuthzError> {
        let mut tx = self.begin().await?;

        let user_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if !user_exists {
            return Err(AuthzError::Referential {
                entity: "user",
                id: user_id,
            });
        }

        for role_id in role_ids {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1)")
                    .bind(role_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AuthzError::Referential {
                    entity: "role",
                    id: *role_id,
                });
            }
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for role_id in role_ids {
            sqlx::query(
                r#"
                INSERT INTO user_roles (user_id, role_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
