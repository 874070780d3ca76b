//! Periodic job definitions

use super::config::JobSchedule;
use super::error::SchedulerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

pub type JobId = Uuid;

type JobFn = dyn Fn() -> Pin<Box<dyn Future<Output = SchedulerResult<()>> + Send>> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
}

/// Bookkeeping for one registered job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    pub id: JobId,
    pub name: String,
    pub schedule: JobSchedule,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_duration_ms: f64,
}

impl JobMetadata {
    pub fn new(name: impl Into<String>, schedule: JobSchedule) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            schedule,
            status: JobStatus::Scheduled,
            created_at: Utc::now(),
            last_run: None,
            last_error: None,
            run_count: 0,
            success_count: 0,
            failure_count: 0,
            avg_duration_ms: 0.0,
        }
    }

    pub fn record_run(&mut self, result: &SchedulerResult<()>, duration_ms: u64) {
        self.run_count += 1;
        match result {
            Ok(()) => {
                self.success_count += 1;
                self.last_error = None;
                self.status = JobStatus::Completed;
            }
            Err(e) => {
                self.failure_count += 1;
                self.last_error = Some(e.to_string());
                self.status = JobStatus::Failed;
            }
        }

        // Running mean
        self.avg_duration_ms = ((self.avg_duration_ms * (self.run_count - 1) as f64)
            + duration_ms as f64)
            / self.run_count as f64;
        self.last_run = Some(Utc::now());
    }
}

/// A named unit of work fired by the scheduler
pub struct Job {
    metadata: tokio::sync::RwLock<JobMetadata>,
    execute: Arc<JobFn>,
}

impl Job {
    pub fn new<F, Fut>(metadata: JobMetadata, execute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SchedulerResult<()>> + Send + 'static,
    {
        Self {
            metadata: tokio::sync::RwLock::new(metadata),
            execute: Arc::new(move || Box::pin(execute())),
        }
    }

    pub async fn metadata(&self) -> JobMetadata {
        self.metadata.read().await.clone()
    }

    /// Run once and fold the outcome into the metadata.
    pub async fn execute(&self) -> SchedulerResult<()> {
        let start = std::time::Instant::now();
        self.metadata.write().await.status = JobStatus::Running;

        let result = (self.execute)().await;

        let duration_ms = start.elapsed().as_millis() as u64;
        self.metadata.write().await.record_run(&result, duration_ms);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncCategory;
    use crate::scheduler::SchedulerError;

    #[tokio::test]
    async fn test_execute_tracks_outcomes() {
        let job = Job::new(JobMetadata::new("flaky", JobSchedule::IntervalHours(1)), || async {
            Err(SchedulerError::SyncFailed(vec![SyncCategory::Metrics]))
        });

        assert!(job.execute().await.is_err());
        let metadata = job.metadata().await;
        assert_eq!(metadata.run_count, 1);
        assert_eq!(metadata.failure_count, 1);
        assert_eq!(metadata.status, JobStatus::Failed);
        assert_eq!(metadata.last_error.as_deref(), Some("Sync categories failed: metrics"));
        assert!(metadata.last_run.is_some());
    }

    #[test]
    fn test_success_clears_last_error() {
        let mut metadata = JobMetadata::new("sync", JobSchedule::default());
        metadata.record_run(&Err(SchedulerError::StartupFailed("boom".to_string())), 10);
        metadata.record_run(&Ok(()), 30);

        assert_eq!(metadata.run_count, 2);
        assert_eq!(metadata.success_count, 1);
        assert!(metadata.last_error.is_none());
        assert_eq!(metadata.avg_duration_ms, 20.0);
    }
}
