//! Schedule definitions for periodic jobs

use super::error::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// When a periodic job fires.
///
/// In TOML either `schedule = { cron = "0 0 5 * * *" }` or
/// `schedule = { interval_hours = 6 }`. Cron expressions carry a leading
/// seconds field and are evaluated in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSchedule {
    Cron(String),
    IntervalHours(u64),
}

impl Default for JobSchedule {
    fn default() -> Self {
        // Daily at 05:00
        JobSchedule::Cron("0 0 5 * * *".to_string())
    }
}

impl JobSchedule {
    pub fn validate(&self) -> SchedulerResult<()> {
        match self {
            JobSchedule::Cron(expr) if expr.split_whitespace().count() < 6 => {
                Err(SchedulerError::invalid_schedule(self, "expected 6 or 7 fields"))
            }
            JobSchedule::Cron(_) => Ok(()),
            JobSchedule::IntervalHours(0) => {
                Err(SchedulerError::invalid_schedule(self, "interval_hours must be at least 1"))
            }
            JobSchedule::IntervalHours(_) if self.interval().is_none() => {
                Err(SchedulerError::invalid_schedule(self, "interval_hours is too large"))
            }
            JobSchedule::IntervalHours(_) => Ok(()),
        }
    }

    /// Period for interval schedules; `None` for cron or an interval whose
    /// seconds overflow `u64`.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            JobSchedule::IntervalHours(hours) => hours.checked_mul(3600).map(Duration::from_secs),
            JobSchedule::Cron(_) => None,
        }
    }
}

impl fmt::Display for JobSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobSchedule::Cron(expr) => write!(f, "cron({})", expr),
            JobSchedule::IntervalHours(hours) => write!(f, "every {}h", hours),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_daily_cron() {
        let schedule = JobSchedule::default();
        assert_eq!(schedule, JobSchedule::Cron("0 0 5 * * *".to_string()));
        assert!(schedule.validate().is_ok());
        assert!(schedule.interval().is_none());
    }

    #[test]
    fn test_interval_validation() {
        assert!(JobSchedule::IntervalHours(0).validate().is_err());
        assert_eq!(
            JobSchedule::IntervalHours(2).interval(),
            Some(Duration::from_secs(7200))
        );
    }

    #[test]
    fn test_five_field_cron_rejected() {
        let err = JobSchedule::Cron("0 5 * * *".to_string()).validate().unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
        assert!(err.to_string().contains("cron(0 5 * * *)"));
    }

    #[test]
    fn test_overflowing_interval_rejected() {
        let schedule = JobSchedule::IntervalHours(u64::MAX / 1000);
        assert_eq!(schedule.interval(), None);
        let err = schedule.validate().unwrap_err();
        assert!(err.to_string().contains("too large"));

        let largest = JobSchedule::IntervalHours(u64::MAX / 3600);
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn test_deserialize_both_modes() {
        let cron: JobSchedule = serde_json::from_str(r#"{"cron":"0 30 * * * *"}"#).unwrap();
        assert_eq!(cron, JobSchedule::Cron("0 30 * * * *".to_string()));

        let interval: JobSchedule = serde_json::from_str(r#"{"interval_hours":6}"#).unwrap();
        assert_eq!(interval, JobSchedule::IntervalHours(6));
    }
}
