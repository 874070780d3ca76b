use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The three independently managed search indices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
    Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IndexKind {
    Fields,
    DimensionValues,
    Metrics,
}

impl IndexKind {
    /// Physical index name under a namespace prefix, e.g. `kman_fields`.
    pub fn index_name(self, prefix: &str) -> String {
        format!("{}_{}", prefix, self)
    }

    pub fn all() -> Vec<IndexKind> {
        IndexKind::iter().collect()
    }
}

/// Lifecycle state of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexState {
    Absent,
    Creating,
    Ready,
    Deleting,
}

/// The only two states a search path may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Readiness {
    Ready,
    Absent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub kind: IndexKind,
    pub name: String,
    pub state: IndexState,
    pub document_count: u64,
    pub last_build: Option<DateTime<Utc>>,
    /// Generation currently served to readers
    pub generation: Option<u64>,
}

impl IndexDescriptor {
    pub fn absent(kind: IndexKind, prefix: &str) -> Self {
        Self {
            kind,
            name: kind.index_name(prefix),
            state: IndexState::Absent,
            document_count: 0,
            last_build: None,
            generation: None,
        }
    }
}

/// Which indices a bulk lifecycle request targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSelection {
    #[serde(default)]
    pub fields: bool,
    #[serde(default)]
    pub dimension_values: bool,
    #[serde(default)]
    pub metrics: bool,
}

impl IndexSelection {
    pub fn all() -> Self {
        Self {
            fields: true,
            dimension_values: true,
            metrics: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.fields || self.dimension_values || self.metrics)
    }

    /// Selected kinds in a stable order.
    pub fn kinds(&self) -> Vec<IndexKind> {
        let mut kinds = Vec::new();
        if self.fields {
            kinds.push(IndexKind::Fields);
        }
        if self.dimension_values {
            kinds.push(IndexKind::DimensionValues);
        }
        if self.metrics {
            kinds.push(IndexKind::Metrics);
        }
        kinds
    }
}
