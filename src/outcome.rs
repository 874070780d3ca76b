//! Per-unit accounting shared by index deletion, sync runs and extraction

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure<T> {
    pub unit: T,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSkip<T> {
    pub unit: T,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total_requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// What happened to each unit of a bulk operation.
///
/// Every requested unit lands in exactly one of the three lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<UnitFailure<T>>,
    pub skipped: Vec<UnitSkip<T>>,
}

impl<T> Default for BulkOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BulkOutcome<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(&mut self, unit: T) {
        self.succeeded.push(unit);
    }

    pub fn fail(&mut self, unit: T, error: impl ToString) {
        self.failed.push(UnitFailure {
            unit,
            error: error.to_string(),
        });
    }

    pub fn skip(&mut self, unit: T, reason: impl Into<String>) {
        self.skipped.push(UnitSkip {
            unit,
            reason: reason.into(),
        });
    }

    /// True when nothing failed. Skips do not count as failures.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> BulkSummary {
        BulkSummary {
            total_requested: self.succeeded.len() + self.failed.len() + self.skipped.len(),
            succeeded: self.succeeded.len(),
            failed: self.failed.len(),
            skipped: self.skipped.len(),
        }
    }

    pub fn merge(&mut self, other: BulkOutcome<T>) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
    }

    pub fn map_units<U, F>(self, f: F) -> BulkOutcome<U>
    where
        F: Fn(T) -> U,
    {
        BulkOutcome {
            succeeded: self.succeeded.into_iter().map(&f).collect(),
            failed: self
                .failed
                .into_iter()
                .map(|x| UnitFailure {
                    unit: f(x.unit),
                    error: x.error,
                })
                .collect(),
            skipped: self
                .skipped
                .into_iter()
                .map(|x| UnitSkip {
                    unit: f(x.unit),
                    reason: x.reason,
                })
                .collect(),
        }
    }
}
