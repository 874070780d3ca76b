//! Scheduler failures: bad schedules, registration problems and the outcome
//! of the periodic sync job

use super::jobs::JobId;
use crate::error::AppError;
use crate::models::SyncCategory;
use crate::sync::SyncError;

pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Failed to start scheduler: {0}")]
    StartupFailed(String),

    #[error("Failed to shutdown scheduler: {0}")]
    ShutdownFailed(String),

    #[error("Failed to register job '{name}': {reason}")]
    Registration { name: String, reason: String },

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Rejected before the job is registered
    #[error("Invalid schedule {schedule}: {reason}")]
    InvalidSchedule { schedule: String, reason: String },

    /// A scheduled sync finished but some categories reported failure
    #[error("Sync categories failed: {}", join(.0))]
    SyncFailed(Vec<SyncCategory>),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

fn join(categories: &[SyncCategory]) -> String {
    categories
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl SchedulerError {
    pub(crate) fn invalid_schedule(schedule: impl ToString, reason: impl Into<String>) -> Self {
        SchedulerError::InvalidSchedule {
            schedule: schedule.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<SchedulerError> for AppError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::JobNotFound(_) => AppError::NotFound(err.to_string()),
            SchedulerError::InvalidSchedule { .. } => AppError::Configuration(err.to_string()),
            SchedulerError::Sync(sync) => sync.into(),
            _ => AppError::Internal(err.to_string()),
        }
    }
}
