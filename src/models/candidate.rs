use super::{DimensionValueRecord, FieldKey, FieldRecord, MetricRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Matching engines, in tie-break priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Engine {
    Fulltext,
    Pattern,
    Similarity,
    /// Full-text lookup over the dimension value index, most frequent first
    DimensionValues,
}

impl Engine {
    /// Lower is preferred when fused scores tie.
    pub fn priority(self) -> u8 {
        match self {
            Engine::Fulltext => 0,
            Engine::Pattern => 1,
            Engine::Similarity => 2,
            Engine::DimensionValues => 3,
        }
    }

    /// Engine whose weight and score normalization apply.
    pub fn scoring(self) -> Engine {
        match self {
            Engine::DimensionValues => Engine::Fulltext,
            other => other,
        }
    }
}

/// Engine-agnostic identity used to group hits across engines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CandidateId {
    Field(FieldKey),
    Metric(i64),
    DimensionValue(String),
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateId::Field(key) => write!(f, "field:{}", key),
            CandidateId::Metric(id) => write!(f, "metric:{}", id),
            CandidateId::DimensionValue(hash) => write!(f, "dimension_value:{}", hash),
        }
    }
}

/// The record a candidate wraps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateRecord {
    Field {
        field: FieldRecord,
    },
    Metric {
        metric: MetricRecord,
    },
    DimensionValue {
        field: FieldRecord,
        dimension_value: String,
        frequency: u64,
        value_hash: String,
    },
}

impl CandidateRecord {
    pub fn id(&self) -> CandidateId {
        match self {
            CandidateRecord::Field { field } => CandidateId::Field(field.key()),
            CandidateRecord::Metric { metric } => CandidateId::Metric(metric.metric_id),
            CandidateRecord::DimensionValue { value_hash, .. } => {
                CandidateId::DimensionValue(value_hash.clone())
            }
        }
    }

    /// Text shown to users for this candidate.
    pub fn label(&self) -> &str {
        match self {
            CandidateRecord::Field { field } => &field.display_name,
            CandidateRecord::Metric { metric } => &metric.name,
            CandidateRecord::DimensionValue {
                dimension_value, ..
            } => dimension_value,
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        match self {
            CandidateRecord::Field { field } | CandidateRecord::DimensionValue { field, .. } => {
                Some(&field.table_name)
            }
            CandidateRecord::Metric { .. } => None,
        }
    }

    pub fn frequency(&self) -> Option<u64> {
        match self {
            CandidateRecord::DimensionValue { frequency, .. } => Some(*frequency),
            _ => None,
        }
    }
}

impl From<FieldRecord> for CandidateRecord {
    fn from(field: FieldRecord) -> Self {
        CandidateRecord::Field { field }
    }
}

impl From<MetricRecord> for CandidateRecord {
    fn from(metric: MetricRecord) -> Self {
        CandidateRecord::Metric { metric }
    }
}

impl From<DimensionValueRecord> for CandidateRecord {
    fn from(record: DimensionValueRecord) -> Self {
        CandidateRecord::DimensionValue {
            field: record.field,
            dimension_value: record.value,
            frequency: record.frequency,
            value_hash: record.value_hash,
        }
    }
}

/// One engine's view of a candidate for the duration of a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub record: CandidateRecord,
    pub engine: Engine,
    pub raw_score: f64,
    pub snippet: Option<String>,
}

impl SearchCandidate {
    pub fn new(record: CandidateRecord, engine: Engine, raw_score: f64) -> Self {
        Self {
            record,
            engine,
            raw_score,
            snippet: None,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn id(&self) -> CandidateId {
        self.record.id()
    }
}
