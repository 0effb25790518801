//! `AppError` → HTTP response mapping. No server needed: `IntoResponse` is
//! called directly on error values.

use axum::{body, http::StatusCode, response::IntoResponse, response::Response};
use uuid::Uuid;

use vantage::authz::AuthzError;
use vantage::error::{AppError, FieldErrors};

async fn body_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn unauthenticated_redirects_to_login() {
    let response = AppError::Unauthenticated.into_response();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get("location").unwrap(), "/login");
}

#[tokio::test]
async fn missing_permission_returns_403_naming_the_permission() {
    let response = AppError::Forbidden("view_analytics").into_response();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_text(response).await.contains("view_analytics"));
}

#[tokio::test]
async fn validation_failure_returns_422_with_field_messages() {
    let mut errors = FieldErrors::new();
    errors.push("name", "Name is required");
    errors.push("bio", "Bio must be at most 500 characters");

    let response = AppError::Validation(errors).into_response();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let text = body_text(response).await;
    assert!(text.contains("name: Name is required"));
    assert!(text.contains("bio: Bio must be at most 500 characters"));
}

#[tokio::test]
async fn referential_failure_returns_422_with_the_offending_id() {
    let id = Uuid::new_v4();
    let response = AppError::Authz(AuthzError::Referential { entity: "role", id }).into_response();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let text = body_text(response).await;
    assert!(text.contains("role"));
    assert!(text.contains(&id.to_string()));
}

#[tokio::test]
async fn bad_request_returns_400() {
    let response = AppError::BadRequest("malformed multipart request").into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn database_failure_returns_500_without_detail() {
    let response = AppError::Database(sqlx::Error::RowNotFound).into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "internal server error");
}
