use std::collections::BTreeMap;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// Errors surfaced by handlers. Every variant maps to exactly one status code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Per-field validation messages, keyed by field name.
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("email address already exists")]
    DuplicateEmail,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".into())
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.into());
        ApiError::Validation(errors)
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        ApiError::Internal(e.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!({
                "message": "Validation failed",
                "errors": errors,
            }),
            ApiError::DuplicateEmail => json!({
                "message": "Validation failed",
                "errors": { "email": "email address already exists" },
            }),
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Unauthorized(message) => json!({ "message": message }),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "internal error");
                json!({ "message": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errs: ValidationErrors) -> Self {
        let errors = errs
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let message = errors
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{field} is invalid"));
                (field.to_string(), message)
            })
            .collect();
        ApiError::Validation(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
