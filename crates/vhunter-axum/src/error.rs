//! Axum-specific error types and mappings.
//!
//! Maps [`VideoError`] to HTTP status codes and a JSON body of the form
//! `{error, status, type?, metadata?}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use vhunter_core::{VideoDescriptor, VideoError};

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The task is in a state that does not allow the operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A required tool is missing or the server is shutting down.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An upstream tool or host failed.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Every resolution strategy failed; carries the remediation descriptor.
    #[error("Unresolved: {message}")]
    Unresolved {
        message: String,
        descriptor: Box<VideoDescriptor>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    /// Stable error type discriminant for client-side handling
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message, error_type, metadata) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None, None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None, None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg, None, None),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None, None),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg, None, None),
            Self::Unresolved {
                message,
                descriptor,
            } => {
                let error_type = descriptor.error_type.map(|c| c.as_str().to_string());
                (
                    StatusCode::BAD_GATEWAY,
                    message,
                    error_type,
                    serde_json::to_value(*descriptor).ok(),
                )
            }
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None, None),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
            error_type,
            metadata,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<VideoError> for HttpError {
    fn from(err: VideoError) -> Self {
        let message = err.user_message();
        match err {
            VideoError::InvalidInput(_) | VideoError::UnsupportedUrl(_) => Self::BadRequest(message),
            VideoError::TaskNotFound(_) => Self::NotFound(message),
            VideoError::InvalidTransition { .. } => Self::Conflict(message),
            VideoError::ToolUnavailable { .. } => Self::ServiceUnavailable(err.to_string()),
            VideoError::Unresolved {
                message,
                descriptor,
            } => Self::Unresolved {
                message,
                descriptor,
            },
            VideoError::LoginRequired(_)
            | VideoError::ProcessFailed { .. }
            | VideoError::EmptyOutput { .. }
            | VideoError::Parse { .. }
            | VideoError::Network { .. } => Self::BadGateway(message),
            VideoError::ArtifactNotFound { .. } | VideoError::StaleArtifact { .. } => {
                Self::NotFound(message)
            }
            VideoError::Cancelled => Self::Conflict(message),
            VideoError::Io { .. } => Self::Internal(message),
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
