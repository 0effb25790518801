use std::fmt;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::authz::AuthzError;

/// Field-level validation failures, accumulated before any mutation runs.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

#[derive(Debug)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: FieldErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("missing required permission: {0}")]
    Forbidden(&'static str),

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("token creation failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("file storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("template rendering failed: {0}")]
    Render(#[from] askama::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthenticated => Redirect::to("/login").into_response(),
            AppError::Forbidden(permission) => (
                StatusCode::FORBIDDEN,
                Html(format!(
                    "<h1>403 Forbidden</h1><p>This page requires the <code>{}</code> permission.</p>",
                    permission
                )),
            )
                .into_response(),
            AppError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, errors.to_string()).into_response()
            }
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, message.to_string()).into_response()
            }
            AppError::Authz(AuthzError::Referential { entity, id }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("unknown {}: {}", entity, id),
            )
                .into_response(),
            AppError::Authz(err) => {
                log::error!("authorization model failure: {}", err);
                internal_error()
            }
            AppError::Database(err) => {
                log::error!("database failure: {}", err);
                internal_error()
            }
            AppError::PasswordHash(err) => {
                log::error!("password hashing failure: {}", err);
                internal_error()
            }
            AppError::Token(err) => {
                log::error!("token failure: {}", err);
                internal_error()
            }
            AppError::Storage(err) => {
                log::error!("file storage failure: {}", err);
                internal_error()
            }
            AppError::Render(err) => {
                log::error!("template failure: {}", err);
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}
