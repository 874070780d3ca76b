//! Error types for upstream sources

use crate::error::AppError;

pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Could not reach the source at all
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Source call timed out: {0}")]
    Timeout(String),

    /// Table or column name that cannot be used in a query
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The source answered with an error for this request
    #[error("Query failed: {0}")]
    Query(String),

    /// Upstream returned something we could not decode
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source configuration error: {0}")]
    Configuration(String),
}

impl SourceError {
    /// Retryable failures: connectivity, timeouts and 5xx/429 answers.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Connection(_) | SourceError::Timeout(_) => true,
            SourceError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => SourceError::Timeout(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::Tls(_) => {
                SourceError::Connection(err.to_string())
            }
            sqlx::Error::Configuration(_) => SourceError::Configuration(err.to_string()),
            _ => SourceError::Query(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_connect() {
            SourceError::Connection(err.to_string())
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SourceError::Connection(err.to_string())
        }
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Connection(msg) | SourceError::Timeout(msg) => AppError::TransientBackend(msg),
            SourceError::InvalidIdentifier(msg) => AppError::Validation(msg),
            SourceError::UnknownSource(msg) => AppError::NotFound(msg),
            SourceError::Configuration(msg) => AppError::Configuration(msg),
            other if other.is_transient() => AppError::TransientBackend(other.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}
