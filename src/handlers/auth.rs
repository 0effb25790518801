use askama::Template;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    authz::RbacStore,
    database::Database,
    error::AppError,
    middleware::{auth::AUTH_COOKIE, get_current_user},
    models::User,
    utils::{create_token, hash_password, verify_password},
};

const MIN_PASSWORD_LEN: usize = 8;
const SESSION_TTL_HOURS: i64 = 24;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    error: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    name: String,
    email: String,
    password: String,
}

pub async fn login_page(cookies: Cookies, State(db): State<Database>) -> Result<Response, AppError> {
    // Guest-only page: signed-in users go straight to the dashboard.
    if get_current_user(&cookies, &db).await?.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let template = LoginTemplate {
        error: String::new(),
    };
    Ok(Html(template.render()?).into_response())
}

pub async fn register_page(
    cookies: Cookies,
    State(db): State<Database>,
) -> Result<Response, AppError> {
    if get_current_user(&cookies, &db).await?.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let template = RegisterTemplate {
        error: String::new(),
    };
    Ok(Html(template.render()?).into_response())
}

pub async fn login(
    State(db): State<Database>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 AND is_active = true")
        .bind(&form.email)
        .fetch_optional(&db)
        .await?;

    let user = match user {
        Some(user) if verify_password(&form.password, &user.password_hash).unwrap_or(false) => user,
        _ => {
            log::warn!("failed login attempt for {}", form.email);
            let template = LoginTemplate {
                error: "Invalid email or password".to_string(),
            };
            return Ok((StatusCode::UNAUTHORIZED, Html(template.render()?)).into_response());
        }
    };

    let token = create_token(user.id, user.email.clone())?;

    // Session record for tracking alongside the stateless cookie.
    let session_id = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
    sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(session_id)
        .bind(user.id)
        .bind(expires_at)
        .execute(&db)
        .await?;

    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&db)
        .await?;

    let cookie = Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build();
    cookies.add(cookie);

    Ok(Redirect::to("/dashboard").into_response())
}

pub async fn register(
    State(db): State<Database>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if let Some(message) = validate_registration(&form) {
        let template = RegisterTemplate {
            error: message.to_string(),
        };
        return Ok((StatusCode::BAD_REQUEST, Html(template.render()?)).into_response());
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&form.email)
        .fetch_one(&db)
        .await?;
    if taken {
        let template = RegisterTemplate {
            error: "An account with that email already exists".to_string(),
        };
        return Ok((StatusCode::BAD_REQUEST, Html(template.render()?)).into_response());
    }

    let password_hash = hash_password(&form.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, name)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&form.email)
    .bind(&password_hash)
    .bind(&form.name)
    .fetch_one(&db)
    .await?;

    // New accounts start with the standard role when it has been provisioned.
    if let Some(role_id) = db.role_id_by_name("user").await? {
        db.replace_user_roles(user.id, &[role_id]).await?;
    }

    Ok(Redirect::to("/login").into_response())
}

pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    cookies.remove(Cookie::from(AUTH_COOKIE));
    Redirect::to("/login")
}

fn validate_registration(form: &RegisterForm) -> Option<&'static str> {
    if form.name.trim().is_empty() {
        return Some("Name is required");
    }
    if form.name.chars().count() > 255 {
        return Some("Name must be at most 255 characters");
    }
    if !form.email.contains('@') {
        return Some("A valid email address is required");
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, password: &str) -> RegisterForm {
        RegisterForm {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn registration_requires_name() {
        assert_eq!(
            validate_registration(&form("  ", "a@b.com", "longenough")),
            Some("Name is required")
        );
    }

    #[test]
    fn registration_requires_plausible_email() {
        assert_eq!(
            validate_registration(&form("Jo", "not-an-email", "longenough")),
            Some("A valid email address is required")
        );
    }

    #[test]
    fn registration_enforces_password_length() {
        assert_eq!(
            validate_registration(&form("Jo", "a@b.com", "short")),
            Some("Password must be at least 8 characters")
        );
    }

    #[test]
    fn valid_registration_passes() {
        assert_eq!(validate_registration(&form("Jo", "a@b.com", "longenough")), None);
    }
}
