//! Periodic job scheduling on top of tokio-cron-scheduler
//!
//! The service keeps a registry of named jobs, each fired either by a cron
//! expression or at a fixed hourly interval. The discovery service registers
//! one job that runs a full sync.
//!
//! # Example
//!
//! ```no_run
//! use metadata_discovery::scheduler::{Job, JobMetadata, JobSchedule, SchedulerService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scheduler = SchedulerService::new().await?;
//!     let job = Job::new(
//!         JobMetadata::new("heartbeat", JobSchedule::IntervalHours(1)),
//!         || async { Ok(()) },
//!     );
//!     scheduler.add_job(job).await?;
//!     scheduler.start().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod jobs;
mod metrics;

pub use config::JobSchedule;
pub use core::SchedulerService;
pub use error::{SchedulerError, SchedulerResult};
pub use jobs::{Job, JobId, JobMetadata, JobStatus};
pub use metrics::{init_scheduler_metrics, SCHEDULER_METRICS};

use crate::models::{SyncCategory, SyncStatus};
use crate::sync::{SyncError, SyncResult, SyncService};
use std::sync::Arc;

pub const SYNC_JOB_NAME: &str = "sync_all";

/// Job that runs a full sync.
pub fn sync_job(sync: Arc<SyncService>) -> Job {
    let metadata = JobMetadata::new(SYNC_JOB_NAME, sync.config().schedule.clone());
    Job::new(metadata, move || {
        let sync = sync.clone();
        async move { sync_outcome(sync.run_periodic().await) }
    })
}

/// A run already in progress counts as a skip, not a failure.
fn sync_outcome(result: SyncResult<SyncStatus>) -> SchedulerResult<()> {
    match result {
        Ok(status) => {
            let failed: Vec<SyncCategory> = SyncCategory::All
                .expand()
                .into_iter()
                .filter(|category| status.category(*category).is_some_and(|c| !c.success))
                .collect();
            if failed.is_empty() {
                Ok(())
            } else {
                Err(SchedulerError::SyncFailed(failed))
            }
        }
        Err(SyncError::InProgress) => {
            tracing::info!("Periodic sync skipped, another run is active");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryStatus;
    use chrono::Utc;

    fn category(success: bool) -> Option<CategoryStatus> {
        Some(CategoryStatus {
            success,
            detail: serde_json::Value::Null,
            error: (!success).then(|| "source unreachable".to_string()),
            finished_at: Utc::now(),
        })
    }

    #[test]
    fn test_sync_outcome_names_failed_categories() {
        let status = SyncStatus {
            success: Some(false),
            metadata: category(true),
            metrics: category(false),
            dimension_values: category(false),
            ..Default::default()
        };
        let err = sync_outcome(Ok(status)).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::SyncFailed(ref failed)
                if failed == &vec![SyncCategory::DimensionValues, SyncCategory::Metrics]
        ));
    }

    #[test]
    fn test_sync_in_progress_is_a_skip() {
        assert!(sync_outcome(Err(SyncError::InProgress)).is_ok());
        assert!(sync_outcome(Ok(SyncStatus::default())).is_ok());

        let err = sync_outcome(Err(SyncError::EmptySource("fields"))).unwrap_err();
        assert!(matches!(err, SchedulerError::Sync(SyncError::EmptySource("fields"))));
    }
}
