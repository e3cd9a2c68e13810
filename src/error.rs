use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::responses::{ApiResponse, ErrorResponse, ValidationErrorDetail};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Idempotency store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation failed")]
    InvalidFields(Vec<ValidationErrorDetail>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidFields(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Redis(_) | AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> ErrorResponse {
        match self {
            AppError::Validation(msg) => ErrorResponse::new("VALIDATION_ERROR", msg.clone()),
            AppError::InvalidFields(details) => {
                ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                    .with_details(details.clone())
            }
            AppError::NotFound(msg) => ErrorResponse::new("NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => ErrorResponse::new("CONFLICT", msg.clone()),
            AppError::Redis(_) | AppError::StoreUnavailable(_) => ErrorResponse::new(
                "IDEMPOTENCY_STORE_UNAVAILABLE",
                "Idempotency store is unavailable, retry later",
            ),
            AppError::Database(_) | AppError::Internal(_) => {
                ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(ApiResponse::<()>::error(self.error_response()))).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        AppError::InvalidFields(details)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
