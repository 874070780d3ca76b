//! Error types for sync runs

use crate::error::AppError;
use crate::lifecycle::LifecycleError;
use crate::matcher::MatcherError;
use crate::sources::SourceError;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Another run holds the single-flight flag
    #[error("Sync already in progress")]
    InProgress,

    /// The upstream returned nothing for a full reload
    #[error("Source returned no {0}")]
    EmptySource(&'static str),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Catalog rebuild failed: {0}")]
    Catalog(#[from] MatcherError),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::InProgress => AppError::Conflict(err.to_string()),
            SyncError::EmptySource(_) => AppError::NotFound(err.to_string()),
            SyncError::Source(source) => source.into(),
            SyncError::Lifecycle(lifecycle) => lifecycle.into(),
            SyncError::Catalog(_) => AppError::Internal(err.to_string()),
        }
    }
}
