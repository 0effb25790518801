use std::path::Path;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, FieldErrors},
    middleware::{get_current_user, CurrentUser},
    models::User,
};

const MAX_NAME_LEN: usize = 255;
const MAX_PHONE_LEN: usize = 20;
const MAX_BIO_LEN: usize = 500;
const MAX_AVATAR_BYTES: usize = 1024 * 1024;
const AVATAR_DIR: &str = "static/avatars";

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    avatar_url: String,
    name: String,
    email: String,
    phone: String,
    bio: String,
    errors: Vec<String>,
    updated: bool,
    current_user: CurrentUser,
}

#[derive(Deserialize)]
pub struct ProfileQuery {
    updated: Option<String>,
}

/// Allow-listed profile fields. Nothing outside this set is ever written.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.name.trim().is_empty() {
            errors.push("name", "Name is required");
        } else if self.name.chars().count() > MAX_NAME_LEN {
            errors.push("name", "Name must be at most 255 characters");
        }

        if self.email.trim().is_empty() {
            errors.push("email", "Email address is required");
        } else if !is_valid_email(&self.email) {
            errors.push("email", "Email address is invalid");
        }

        if let Some(phone) = &self.phone {
            if phone.chars().count() > MAX_PHONE_LEN {
                errors.push("phone", "Phone number must be at most 20 characters");
            }
        }

        if let Some(bio) = &self.bio {
            if bio.chars().count() > MAX_BIO_LEN {
                errors.push("bio", "Bio must be at most 500 characters");
            }
        }

        errors.into_result()
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn avatar_extension(content_type: Option<&str>) -> Option<&'static str> {
    match content_type {
        Some("image/png") => Some("png"),
        Some("image/jpeg") => Some("jpg"),
        Some("image/gif") => Some("gif"),
        Some("image/webp") => Some("webp"),
        _ => None,
    }
}

pub async fn profile_page(
    cookies: Cookies,
    State(db): State<Database>,
    Query(query): Query<ProfileQuery>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(current_user.id)
        .fetch_optional(&db)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let template = ProfileTemplate {
        avatar_url: user.avatar_url(),
        name: user.name,
        email: user.email,
        phone: user.phone.unwrap_or_default(),
        bio: user.bio.unwrap_or_default(),
        errors: Vec::new(),
        updated: query.updated.is_some(),
        current_user,
    };

    Ok(Html(template.render()?))
}

pub async fn update_profile(
    cookies: Cookies,
    State(db): State<Database>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let mut update = ProfileUpdate::default();
    let mut avatar: Option<(String, Vec<u8>)> = None;
    let mut errors = FieldErrors::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::BadRequest("malformed multipart request"))?
    {
        match field.name().unwrap_or("") {
            "name" => {
                update.name = field
                    .text()
                    .await
                    .map_err(|_| AppError::BadRequest("malformed form field"))?;
            }
            "email" => {
                update.email = field
                    .text()
                    .await
                    .map_err(|_| AppError::BadRequest("malformed form field"))?;
            }
            "phone" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::BadRequest("malformed form field"))?;
                update.phone = (!value.trim().is_empty()).then_some(value);
            }
            "bio" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::BadRequest("malformed form field"))?;
                update.bio = (!value.trim().is_empty()).then_some(value);
            }
            "avatar" => {
                let content_type = field.content_type().map(|v| v.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::BadRequest("malformed upload"))?;
                if data.is_empty() {
                    // No file selected.
                    continue;
                }
                match avatar_extension(content_type.as_deref()) {
                    Some(_) if data.len() > MAX_AVATAR_BYTES => {
                        errors.push("avatar", "Avatar must be 1MB or smaller");
                    }
                    Some(ext) => {
                        avatar = Some((format!("{}.{}", Uuid::new_v4(), ext), data.to_vec()));
                    }
                    None => {
                        errors.push("avatar", "Avatar must be a PNG, JPEG, GIF, or WebP image");
                    }
                }
            }
            _ => {}
        }
    }

    if let Err(field_errors) = update.validate() {
        errors.extend(field_errors);
    }

    if errors.is_empty() {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND id <> $2)")
                .bind(&update.email)
                .bind(current_user.id)
                .fetch_one(&db)
                .await?;
        if taken {
            errors.push("email", "Email address is already in use");
        }
    }

    if !errors.is_empty() {
        let template = ProfileTemplate {
            avatar_url: current_user.avatar_url(),
            name: update.name,
            email: update.email,
            phone: update.phone.unwrap_or_default(),
            bio: update.bio.unwrap_or_default(),
            errors: errors.messages(),
            updated: false,
            current_user,
        };
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(template.render()?)).into_response());
    }

    let avatar_filename = match avatar {
        Some((filename, data)) => {
            tokio::fs::create_dir_all(AVATAR_DIR).await?;
            tokio::fs::write(Path::new(AVATAR_DIR).join(&filename), &data).await?;
            Some(filename)
        }
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE users
        SET name = $1,
            email = $2,
            phone = $3,
            bio = $4,
            avatar = COALESCE($5, avatar),
            updated_at = NOW()
        WHERE id = $6
        "#,
    )
    .bind(&update.name)
    .bind(&update.email)
    .bind(&update.phone)
    .bind(&update.bio)
    .bind(&avatar_filename)
    .bind(current_user.id)
    .execute(&db)
    .await?;

    Ok(Redirect::to("/dashboard/profile?updated=1").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(name: &str, email: &str) -> ProfileUpdate {
        ProfileUpdate {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            bio: None,
        }
    }

    #[test]
    fn valid_update_passes() {
        assert!(update("Jo Smith", "jo@example.com").validate().is_ok());
    }

    #[test]
    fn name_is_required() {
        let errors = update("   ", "jo@example.com").validate().unwrap_err();
        assert_eq!(errors.messages(), ["Name is required"]);
    }

    #[test]
    fn name_length_is_bounded() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        let errors = update(&long, "jo@example.com").validate().unwrap_err();
        assert_eq!(errors.messages(), ["Name must be at most 255 characters"]);
    }

    #[test]
    fn email_must_be_plausible() {
        for bad in ["", "plain", "@no-local.com", "no-domain@", "dot@end."] {
            assert!(update("Jo", bad).validate().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn phone_and_bio_are_bounded() {
        let mut u = update("Jo", "jo@example.com");
        u.phone = Some("5".repeat(MAX_PHONE_LEN + 1));
        u.bio = Some("b".repeat(MAX_BIO_LEN + 1));
        let errors = u.validate().unwrap_err();
        assert_eq!(errors.messages().len(), 2);
    }

    #[test]
    fn optional_fields_within_bounds_pass() {
        let mut u = update("Jo", "jo@example.com");
        u.phone = Some("+1 555 0100".to_string());
        u.bio = Some("Keeps the dashboards tidy.".to_string());
        assert!(u.validate().is_ok());
    }

    #[test]
    fn avatar_extension_accepts_known_image_types() {
        assert_eq!(avatar_extension(Some("image/png")), Some("png"));
        assert_eq!(avatar_extension(Some("image/jpeg")), Some("jpg"));
        assert_eq!(avatar_extension(Some("image/svg+xml")), None);
        assert_eq!(avatar_extension(Some("text/html")), None);
        assert_eq!(avatar_extension(None), None);
    }
}
