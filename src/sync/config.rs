//! Configuration for sync runs

use crate::retry::RetryPolicy;
use crate::scheduler::JobSchedule;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Periodic sync; manual triggers work either way
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub schedule: JobSchedule,

    /// Upstream tables to load; empty loads everything
    #[serde(default)]
    pub table_ids: Vec<i64>,

    /// Upstream metrics to load; empty loads everything
    #[serde(default)]
    pub metric_ids: Vec<i64>,

    /// Periodic runs rebuild every index instead of refreshing
    #[serde(default)]
    pub periodic_force: bool,

    /// Applied to upstream loads
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: JobSchedule::default(),
            table_ids: Vec::new(),
            metric_ids: Vec::new(),
            periodic_force: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub(crate) fn ids(configured: &[i64]) -> Option<Vec<i64>> {
        if configured.is_empty() {
            None
        } else {
            Some(configured.to_vec())
        }
    }
}
