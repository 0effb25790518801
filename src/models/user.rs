use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn avatar_url(&self) -> String {
        avatar_url(self.avatar.as_deref(), &self.name)
    }
}

/// Stored avatars are served from the static tree; users without one get a
/// generated placeholder keyed on their name.
pub fn avatar_url(avatar: Option<&str>, name: &str) -> String {
    match avatar {
        Some(filename) => format!("/static/avatars/{}", filename),
        None => format!(
            "https://ui-avatars.com/api/?name={}&color=7F9CF5&background=EBF4FF",
            urlencoding::encode(name)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_avatar_is_served_from_static_tree() {
        assert_eq!(
            avatar_url(Some("abc.png"), "Jo Smith"),
            "/static/avatars/abc.png"
        );
    }

    #[test]
    fn missing_avatar_falls_back_to_generated_url() {
        let url = avatar_url(None, "Jo Smith");
        assert!(url.starts_with("https://ui-avatars.com/api/?name=Jo%20Smith"));
    }
}
