use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a sync run refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncCategory {
    Metadata,
    Metrics,
    DimensionValues,
    All,
}

impl SyncCategory {
    /// Concrete categories a trigger expands to, in execution order.
    /// Dimension values run after metadata so they see freshly loaded fields.
    pub fn expand(self) -> Vec<SyncCategory> {
        match self {
            SyncCategory::All => vec![
                SyncCategory::Metadata,
                SyncCategory::DimensionValues,
                SyncCategory::Metrics,
            ],
            other => vec![other],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncParams {
    /// Full rebuild into a new generation instead of incremental refresh
    #[serde(default)]
    pub force: bool,
    /// Upstream table ids to reload; configured ids when absent
    #[serde(default)]
    pub table_ids: Option<Vec<i64>>,
    /// Upstream metric ids to reload; configured ids when absent
    #[serde(default)]
    pub metric_ids: Option<Vec<i64>>,
}

impl SyncParams {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Default::default()
        }
    }
}

/// Result of the last run of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatus {
    pub success: bool,
    pub detail: serde_json::Value,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Logical AND over the categories of the last run
    pub success: Option<bool>,
    pub metadata: Option<CategoryStatus>,
    pub metrics: Option<CategoryStatus>,
    pub dimension_values: Option<CategoryStatus>,
}

impl SyncStatus {
    pub fn category(&self, category: SyncCategory) -> Option<&CategoryStatus> {
        match category {
            SyncCategory::Metadata => self.metadata.as_ref(),
            SyncCategory::Metrics => self.metrics.as_ref(),
            SyncCategory::DimensionValues => self.dimension_values.as_ref(),
            SyncCategory::All => None,
        }
    }

    pub fn set_category(&mut self, category: SyncCategory, status: CategoryStatus) {
        match category {
            SyncCategory::Metadata => self.metadata = Some(status),
            SyncCategory::Metrics => self.metrics = Some(status),
            SyncCategory::DimensionValues => self.dimension_values = Some(status),
            SyncCategory::All => {}
        }
    }
}
