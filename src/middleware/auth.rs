use chrono::{DateTime, Utc};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    authz::AccessProfile,
    database::Database,
    error::AppError,
    models::{user::avatar_url, User},
    utils::verify_token,
};

pub const AUTH_COOKIE: &str = "auth_token";

/// The authenticated user for the current request, with their access
/// profile resolved once so handlers and templates share one snapshot.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub access: AccessProfile,
    // Precomputed for templates.
    pub can_manage_users: bool,
    pub can_view_analytics: bool,
    pub can_manage_roles: bool,
}

impl CurrentUser {
    pub fn from_user_and_access(user: User, access: AccessProfile) -> Self {
        let can_manage_users = access.has_permission("manage_users");
        let can_view_analytics = access.has_permission("view_analytics");
        let can_manage_roles = access.has_permission("manage_roles");

        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar: user.avatar,
            last_login_at: user.last_login_at,
            access,
            can_manage_users,
            can_view_analytics,
            can_manage_roles,
        }
    }

    pub fn avatar_url(&self) -> String {
        avatar_url(self.avatar.as_deref(), &self.name)
    }
}

/// Resolves the request's user from the auth cookie. An absent, expired, or
/// malformed token and an inactive account all resolve to `None`; only
/// persistence failures surface as errors.
pub async fn get_current_user(
    cookies: &Cookies,
    db: &Database,
) -> Result<Option<CurrentUser>, AppError> {
    let Some(cookie) = cookies.get(AUTH_COOKIE) else {
        return Ok(None);
    };

    let Ok(claims) = verify_token(cookie.value()) else {
        return Ok(None);
    };

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        return Ok(None);
    };

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active = true")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    let access = AccessProfile::load(db, user.id).await?;

    Ok(Some(CurrentUser::from_user_and_access(user, access)))
}

/// Gate for permission-protected routes; rejects with 403 before any
/// handler logic runs.
pub fn require_permission(user: &CurrentUser, permission: &'static str) -> Result<(), AppError> {
    if user.access.has_permission(permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(permission))
    }
}
