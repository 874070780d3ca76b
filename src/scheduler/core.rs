//! Scheduler service backed by tokio-cron-scheduler

use super::{
    config::JobSchedule,
    error::{SchedulerError, SchedulerResult},
    jobs::{Job, JobId, JobMetadata},
    metrics::SCHEDULER_METRICS,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct Registered {
    job: Arc<Job>,
    /// Id inside tokio-cron-scheduler
    handle: Uuid,
}

pub struct SchedulerService {
    scheduler: JobScheduler,
    jobs: DashMap<JobId, Registered>,
    running: tokio::sync::RwLock<bool>,
}

async fn run_job(job: Arc<Job>) {
    let metadata = job.metadata().await;
    debug!(job_id = %metadata.id, job_name = %metadata.name, "Executing scheduled job");

    SCHEDULER_METRICS.record_execution_start(&metadata.name);
    let start = std::time::Instant::now();
    let result = job.execute().await;
    let duration = start.elapsed();
    SCHEDULER_METRICS.record_execution_complete(&metadata.name, result.is_ok(), duration.as_secs_f64());

    match result {
        Ok(()) => info!(
            job_id = %metadata.id,
            job_name = %metadata.name,
            duration_ms = duration.as_millis() as u64,
            "Job executed successfully"
        ),
        Err(e) => error!(
            job_id = %metadata.id,
            job_name = %metadata.name,
            error = %e,
            duration_ms = duration.as_millis() as u64,
            "Job execution failed"
        ),
    }
}

impl SchedulerService {
    pub async fn new() -> SchedulerResult<Self> {
        info!("Initializing scheduler service");

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        Ok(Self {
            scheduler,
            jobs: DashMap::new(),
            running: tokio::sync::RwLock::new(false),
        })
    }

    pub async fn start(&mut self) -> SchedulerResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Scheduler is already running");
                return Ok(());
            }
            *running = true;
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        info!(jobs = self.jobs.len(), "Scheduler service started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        {
            let mut running = self.running.write().await;
            if !*running {
                warn!("Scheduler is not running");
                return Ok(());
            }
            *running = false;
        }

        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::ShutdownFailed(e.to_string()))?;

        info!("Scheduler service shut down");
        Ok(())
    }

    pub async fn add_job(&self, job: Job) -> SchedulerResult<JobId> {
        let metadata = job.metadata().await;
        metadata.schedule.validate()?;

        let job = Arc::new(job);
        let runner = job.clone();
        let registration = |reason: String| SchedulerError::Registration {
            name: metadata.name.clone(),
            reason,
        };
        let cron_job = match &metadata.schedule {
            JobSchedule::Cron(expr) => CronJob::new_async(expr.as_str(), move |_uuid, _l| {
                Box::pin(run_job(runner.clone()))
            }),
            JobSchedule::IntervalHours(_) => {
                let period = metadata
                    .schedule
                    .interval()
                    .ok_or_else(|| SchedulerError::invalid_schedule(&metadata.schedule, "no interval"))?;
                CronJob::new_repeated_async(period, move |_uuid, _l| Box::pin(run_job(runner.clone())))
            }
        }
        .map_err(|e| registration(e.to_string()))?;

        let handle = self
            .scheduler
            .add(cron_job)
            .await
            .map_err(|e| registration(e.to_string()))?;

        self.jobs.insert(metadata.id, Registered { job, handle });
        SCHEDULER_METRICS.update_job_count("scheduled", self.jobs.len() as f64);

        info!(
            job_id = %metadata.id,
            job_name = %metadata.name,
            schedule = %metadata.schedule,
            "Job added"
        );
        Ok(metadata.id)
    }

    pub async fn remove_job(&self, job_id: &JobId) -> SchedulerResult<()> {
        let (_, registered) = self
            .jobs
            .remove(job_id)
            .ok_or(SchedulerError::JobNotFound(*job_id))?;

        self.scheduler
            .remove(&registered.handle)
            .await
            .map_err(|e| SchedulerError::Registration {
                name: job_id.to_string(),
                reason: e.to_string(),
            })?;
        SCHEDULER_METRICS.update_job_count("scheduled", self.jobs.len() as f64);

        info!(job_id = %job_id, "Job removed");
        Ok(())
    }

    pub async fn job(&self, job_id: &JobId) -> SchedulerResult<JobMetadata> {
        let job = self
            .jobs
            .get(job_id)
            .map(|entry| entry.job.clone())
            .ok_or(SchedulerError::JobNotFound(*job_id))?;
        Ok(job.metadata().await)
    }

    pub async fn list_jobs(&self) -> Vec<JobMetadata> {
        let jobs: Vec<Arc<Job>> = self.jobs.iter().map(|entry| entry.job.clone()).collect();
        let mut out = Vec::with_capacity(jobs.len());
        for job in jobs {
            out.push(job.metadata().await);
        }
        out
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
