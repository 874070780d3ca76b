//! Prometheus metrics for scheduled jobs

use crate::metrics::PROMETHEUS_REGISTRY;
use lazy_static::lazy_static;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts};

const NAMESPACE: &str = "metadata_discovery";

pub struct SchedulerMetrics {
    /// Registered jobs
    pub jobs_total: GaugeVec,

    /// Labels: job_name, outcome
    pub executions_total: CounterVec,

    /// Labels: job_name
    pub execution_duration: HistogramVec,

    /// Labels: job_name
    pub running_jobs: GaugeVec,

    /// Unix timestamp of the last run. Labels: job_name
    pub last_execution: GaugeVec,
}

impl SchedulerMetrics {
    fn new() -> Self {
        Self {
            jobs_total: GaugeVec::new(
                Opts::new("scheduler_jobs", "Number of registered scheduled jobs").namespace(NAMESPACE),
                &["status"],
            )
            .expect("Failed to create scheduler_jobs metric"),

            executions_total: CounterVec::new(
                Opts::new("scheduler_executions_total", "Scheduled job runs by outcome")
                    .namespace(NAMESPACE),
                &["job_name", "outcome"],
            )
            .expect("Failed to create scheduler_executions_total metric"),

            execution_duration: HistogramVec::new(
                HistogramOpts::new(
                    "scheduler_execution_duration_seconds",
                    "Scheduled job duration in seconds",
                )
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
                &["job_name"],
            )
            .expect("Failed to create scheduler_execution_duration_seconds metric"),

            running_jobs: GaugeVec::new(
                Opts::new("scheduler_running_jobs", "Scheduled jobs currently running")
                    .namespace(NAMESPACE),
                &["job_name"],
            )
            .expect("Failed to create scheduler_running_jobs metric"),

            last_execution: GaugeVec::new(
                Opts::new(
                    "scheduler_last_execution_timestamp",
                    "Unix timestamp of the last job run",
                )
                .namespace(NAMESPACE),
                &["job_name"],
            )
            .expect("Failed to create scheduler_last_execution_timestamp metric"),
        }
    }

    fn register(&self) -> Result<(), prometheus::Error> {
        PROMETHEUS_REGISTRY.register(Box::new(self.jobs_total.clone()))?;
        PROMETHEUS_REGISTRY.register(Box::new(self.executions_total.clone()))?;
        PROMETHEUS_REGISTRY.register(Box::new(self.execution_duration.clone()))?;
        PROMETHEUS_REGISTRY.register(Box::new(self.running_jobs.clone()))?;
        PROMETHEUS_REGISTRY.register(Box::new(self.last_execution.clone()))?;
        Ok(())
    }

    pub fn record_execution_start(&self, job_name: &str) {
        self.running_jobs.with_label_values(&[job_name]).inc();
    }

    pub fn record_execution_complete(&self, job_name: &str, success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "failure" };
        self.running_jobs.with_label_values(&[job_name]).dec();
        self.executions_total
            .with_label_values(&[job_name, outcome])
            .inc();
        self.execution_duration
            .with_label_values(&[job_name])
            .observe(duration_secs);
        self.last_execution
            .with_label_values(&[job_name])
            .set(chrono::Utc::now().timestamp() as f64);
    }

    pub fn update_job_count(&self, status: &str, count: f64) {
        self.jobs_total.with_label_values(&[status]).set(count);
    }
}

lazy_static! {
    pub static ref SCHEDULER_METRICS: SchedulerMetrics = SchedulerMetrics::new();
}

/// Register the scheduler collectors. Call once at startup, after
/// [`crate::metrics::init_metrics`].
pub fn init_scheduler_metrics() -> Result<(), prometheus::Error> {
    SCHEDULER_METRICS.register()
}
