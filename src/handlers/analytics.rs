use askama::Template;
use axum::{extract::State, response::Html};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::AppError,
    middleware::{get_current_user, require_permission, CurrentUser},
};

#[derive(Template)]
#[template(path = "analytics.html")]
struct AnalyticsTemplate {
    registrations: Vec<RegistrationPoint>,
    role_usage: Vec<RoleUsage>,
    recent_logins: Vec<RecentLogin>,
    current_user: CurrentUser,
}

#[derive(Debug, FromRow)]
struct RegistrationPoint {
    date: NaiveDate,
    count: i64,
}

#[derive(Debug, FromRow)]
struct RoleUsage {
    display_name: String,
    user_count: i64,
}

#[derive(Debug, FromRow)]
struct RecentLogin {
    name: String,
    email: String,
    last_login_at: DateTime<Utc>,
}

pub async fn analytics(
    cookies: Cookies,
    State(db): State<Database>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    require_permission(&current_user, "view_analytics")?;

    let registrations = sqlx::query_as::<_, RegistrationPoint>(
        r#"
        SELECT created_at::date AS date, COUNT(*) AS count
        FROM users
        WHERE created_at >= NOW() - INTERVAL '30 days'
        GROUP BY created_at::date
        ORDER BY date
        "#,
    )
    .fetch_all(&db)
    .await?;

    let role_usage = sqlx::query_as::<_, RoleUsage>(
        r#"
        SELECT r.display_name, COUNT(ur.user_id) AS user_count
        FROM roles r
        LEFT JOIN user_roles ur ON ur.role_id = r.id
        GROUP BY r.id, r.display_name
        ORDER BY user_count DESC, r.display_name
        "#,
    )
    .fetch_all(&db)
    .await?;

    let recent_logins = sqlx::query_as::<_, RecentLogin>(
        r#"
        SELECT name, email, last_login_at
        FROM users
        WHERE last_login_at IS NOT NULL
          AND last_login_at >= NOW() - INTERVAL '7 days'
        ORDER BY last_login_at DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&db)
    .await?;

    let template = AnalyticsTemplate {
        registrations,
        role_usage,
        recent_logins,
        current_user,
    };

    Ok(Html(template.render()?))
}
