//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

use core_kernel::PortError;
use domain_fees::FeeError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String, Option<Vec<String>>),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string(), None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None),
            ApiError::Validation(msg, details) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg, details)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<FeeError> for ApiError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::InvalidAmount(_) | FeeError::Validation(_) => ApiError::Validation(err.to_string(), None),
            FeeError::NotAssigned(_) | FeeError::NoSchedule(_) => ApiError::BadRequest(err.to_string()),
            FeeError::AlreadyMatched(_) => ApiError::Conflict(err.to_string()),
            FeeError::StudentNotFound(_)
            | FeeError::CategoryNotFound(_)
            | FeeError::ScheduleNotFound(_)
            | FeeError::TransactionNotFound(_)
            | FeeError::PaymentNotFound(_) => ApiError::NotFound(err.to_string()),
            FeeError::Storage(port) => port.into(),
        }
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => ApiError::NotFound(format!("{} {} not found", entity_type, id)),
            PortError::Validation { message, .. } => ApiError::Validation(message, None),
            PortError::Conflict { message } => ApiError::Conflict(message),
            other => {
                error!(error = %other, "Storage failure");
                ApiError::Internal("storage unavailable".to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details = Vec::new();
        collect_details(&errors, "", &mut details);
        details.sort();
        ApiError::Validation("request failed validation".to_string(), Some(details))
    }
}

/// Flattens nested and list errors into `path.to.field: message` lines
fn collect_details(errors: &ValidationErrors, prefix: &str, details: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                details.extend(errs.iter().map(|e| match &e.message {
                    Some(message) => format!("{}: {}", path, message),
                    None => format!("{}: {}", path, e.code),
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect_details(inner, &path, details),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_details(inner, &format!("{}[{}]", path, index), details);
                }
            }
        }
    }
}
