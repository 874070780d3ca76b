use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the service and mapped onto HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    /// Destructive operation attempted without `confirm = true`
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    /// Unknown index, table or job
    #[error("Not found: {0}")]
    NotFound(String),

    /// Source database or search backend unreachable after retries
    #[error("Backend unavailable: {0}")]
    TransientBackend(String),

    /// A bulk operation finished with some units failing
    #[error("Partial failure: {0}")]
    PartialFailure(String),

    /// Rejected request parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// A sync run is already in flight
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A sync stage or request exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status returned for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConfirmationRequired(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TransientBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PartialFailure(_) => StatusCode::MULTI_STATUS,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code placed in the response envelope
    pub fn error_code(&self) -> &str {
        match self {
            AppError::ConfirmationRequired(_) => "CONFIRMATION_REQUIRED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::TransientBackend(_) => "BACKEND_UNAVAILABLE",
            AppError::PartialFailure(_) => "PARTIAL_FAILURE",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "SYNC_IN_PROGRESS",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                code,
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::ConfirmationRequired("delete".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("sync".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::TransientBackend("db".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::ConfirmationRequired("x".to_string()).error_code(),
            "CONFIRMATION_REQUIRED"
        );
        assert_eq!(
            AppError::Validation("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(AppError::Conflict("x".to_string()).error_code(), "SYNC_IN_PROGRESS");
    }
}
