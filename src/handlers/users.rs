use askama::Template;
use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::AppError,
    middleware::{get_current_user, require_permission, CurrentUser},
    models::{Role, User, UserWithRoles},
};

const PAGE_SIZE: i64 = 10;

#[derive(Deserialize)]
pub struct PageQuery {
    page: Option<i64>,
}

#[derive(Template)]
#[template(path = "users.html")]
struct UsersTemplate {
    users: Vec<UserWithRoles>,
    roles: Vec<Role>,
    page: i64,
    page_count: i64,
    prev_page: i64,
    next_page: i64,
    current_user: CurrentUser,
}

pub async fn users_list(
    cookies: Cookies,
    State(db): State<Database>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    require_permission(&current_user, "manage_users")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&db)
        .await?;
    let page_count = ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
    let page = query.page.unwrap_or(1).clamp(1, page_count);

    let accounts = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(PAGE_SIZE)
    .bind((page - 1) * PAGE_SIZE)
    .fetch_all(&db)
    .await?;

    let mut users = Vec::with_capacity(accounts.len());
    for account in accounts {
        let roles: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.display_name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(account.id)
        .fetch_all(&db)
        .await?;

        users.push(UserWithRoles {
            id: account.id,
            email: account.email,
            name: account.name,
            is_active: account.is_active,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
            roles,
        });
    }

    let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name")
        .fetch_all(&db)
        .await?;

    let template = UsersTemplate {
        users,
        roles,
        page,
        page_count,
        prev_page: page - 1,
        next_page: page + 1,
        current_user,
    };

    Ok(Html(template.render()?))
}
