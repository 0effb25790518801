use askama::Template;
use axum::{
    extract::State,
    response::Html,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::AppError,
    middleware::{get_current_user, CurrentUser},
};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    avatar_url: String,
    role_names: Vec<String>,
    total_users: i64,
    active_users: i64,
    total_roles: i64,
    recent_registrations: i64,
    recent_users: Vec<RecentUser>,
    current_user: CurrentUser,
}

#[derive(Debug, FromRow)]
struct RecentUser {
    name: String,
    email: String,
    created_at: DateTime<Utc>,
}

pub async fn dashboard(
    cookies: Cookies,
    State(db): State<Database>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&db)
        .await?;

    let active_users: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = true")
            .fetch_one(&db)
            .await?;

    let total_roles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
        .fetch_one(&db)
        .await?;

    let recent_registrations: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE created_at >= NOW() - INTERVAL '7 days'",
    )
    .fetch_one(&db)
    .await?;

    let recent_users = sqlx::query_as::<_, RecentUser>(
        "SELECT name, email, created_at FROM users ORDER BY created_at DESC LIMIT 5",
    )
    .fetch_all(&db)
    .await?;

    // Display names of the current user's roles, for the welcome badges.
    let role_names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT r.display_name
        FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = $1
        ORDER BY r.name
        "#,
    )
    .bind(current_user.id)
    .fetch_all(&db)
    .await?;

    let template = DashboardTemplate {
        avatar_url: current_user.avatar_url(),
        role_names,
        total_users,
        active_users,
        total_roles,
        recent_registrations,
        recent_users,
        current_user,
    };

    Ok(Html(template.render()?))
}
