use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::EntitlementError;
use crate::llm_client::LlmError;
use crate::upload::UploadError;
use crate::workflow::WorkflowError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: missing entitlement '{0}'")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Service configuration error: {0}")]
    ServiceConfig(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<EntitlementError> for AppError {
    fn from(e: EntitlementError) -> Self {
        match e {
            EntitlementError::Unauthenticated => AppError::Unauthenticated,
            EntitlementError::InvalidToken(inner) => AppError::InvalidToken(inner.to_string()),
            EntitlementError::Forbidden { feature } => AppError::Forbidden(feature),
            EntitlementError::MissingSubject => AppError::InvalidToken(e.to_string()),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingApiKey => AppError::ServiceConfig(e.to_string()),
            LlmError::Parse(_) => AppError::Parse(e.to_string()),
            LlmError::Http(_) | LlmError::Api { .. } | LlmError::MalformedResponse => {
                AppError::Upstream(e.to_string())
            }
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Validation(v) => AppError::Validation(v.to_string()),
            WorkflowError::Generation(llm) => llm.into(),
            WorkflowError::NoSkills => AppError::Upstream(e.to_string()),
            WorkflowError::InFlight(_) | WorkflowError::InvalidState { .. } => {
                AppError::Conflict(e.to_string())
            }
            WorkflowError::Cancelled => AppError::Cancelled,
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::TooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
            UploadError::MissingFile | UploadError::UnsupportedType(_) => {
                AppError::Validation(e.to_string())
            }
            UploadError::Unreadable | UploadError::Empty => {
                AppError::UnprocessableEntity(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Not authenticated.".to_string(),
            ),
            AppError::InvalidToken(detail) => {
                tracing::warn!("Rejected session token: {detail}");
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "Invalid or expired session.".to_string(),
                )
            }
            AppError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You don't have access to this feature.".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Cancelled => (
                StatusCode::CONFLICT,
                "CANCELLED",
                "The request was cancelled because the session was reset.".to_string(),
            ),
            AppError::ServiceConfig(msg) => {
                tracing::error!("Service configuration error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_CONFIG_ERROR",
                    msg.clone(),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::Parse(msg) => {
                tracing::error!("Parse error: {msg}");
                (StatusCode::BAD_GATEWAY, "PARSE_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
