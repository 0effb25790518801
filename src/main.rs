use axum::{
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use std::env;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use vantage::{
    authz,
    database::{create_database_pool, Database},
    handlers,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let db = create_database_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    log::info!("database connection established");

    // Idempotent; safe to run on every boot.
    authz::provision_defaults(&db)
        .await
        .expect("Failed to provision default roles and permissions");

    if env::var("SEED_DEFAULT_USERS").map(|v| v == "1").unwrap_or(false) {
        authz::seed_default_users(&db)
            .await
            .expect("Failed to seed default users");
    }

    let app = create_router(db);

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    log::info!("vantage listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn create_router(db: Database) -> Router {
    Router::new()
        // Public routes
        .route("/", get(|| async { Redirect::permanent("/login") }))
        .route("/health", get(handlers::health::health))
        .route(
            "/login",
            get(handlers::auth::login_page).post(handlers::auth::login),
        )
        .route(
            "/register",
            get(handlers::auth::register_page).post(handlers::auth::register),
        )
        .route("/logout", post(handlers::auth::logout))
        // Authenticated routes
        .route("/dashboard", get(handlers::dashboard::dashboard))
        .route(
            "/dashboard/profile",
            get(handlers::profile::profile_page)
                .put(handlers::profile::update_profile)
                // HTML multipart forms cannot emit PUT.
                .post(handlers::profile::update_profile),
        )
        .route("/dashboard/analytics", get(handlers::analytics::analytics))
        .route("/dashboard/users", get(handlers::users::users_list))
        // Static files (includes uploaded avatars)
        .nest_service("/static", ServeDir::new("static"))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(2 * 1024 * 1024)),
        )
        .with_state(db)
}
