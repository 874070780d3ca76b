//! Error types for index lifecycle operations

use crate::error::AppError;
use crate::models::IndexKind;
use crate::search::SearchError;

pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Destructive request without `confirm = true`
    #[error("Deleting indices requires confirm=true")]
    ConfirmationRequired,

    /// A bulk request that names no index
    #[error("No index selected")]
    EmptySelection,

    /// The backend failed while acting on one index
    #[error("Index {index} failed: {source}")]
    Backend {
        index: IndexKind,
        #[source]
        source: SearchError,
    },
}

impl LifecycleError {
    pub fn backend(index: IndexKind, source: SearchError) -> Self {
        LifecycleError::Backend { index, source }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::ConfirmationRequired => AppError::ConfirmationRequired(err.to_string()),
            LifecycleError::EmptySelection => AppError::Validation(err.to_string()),
            LifecycleError::Backend { source, .. } => source.into(),
        }
    }
}
