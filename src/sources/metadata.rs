//! Metadata source boundary and record decoding

use crate::models::{FieldRecord, FieldType, MetricRecord};
use crate::sources::error::SourceResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use tracing::warn;

/// A record the source returned but the catalog refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub identity: String,
    pub reason: String,
}

/// Decoded records plus the ones rejected along the way
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Loaded<T> {
    fn reject(&mut self, identity: impl Into<String>, reason: impl Into<String>) {
        let rejected = RejectedRecord {
            identity: identity.into(),
            reason: reason.into(),
        };
        warn!(identity = %rejected.identity, reason = %rejected.reason, "Rejected upstream record");
        self.rejected.push(rejected);
    }
}

/// Where field and metric definitions come from.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Load fields, optionally restricted to upstream table ids.
    async fn load_fields(&self, table_ids: Option<&[i64]>) -> SourceResult<Loaded<FieldRecord>>;

    /// Load metrics, optionally restricted to metric ids.
    async fn load_metrics(&self, metric_ids: Option<&[i64]>) -> SourceResult<Loaded<MetricRecord>>;
}

/// What to do with a `field_type` outside the known set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFieldType {
    Reject,
    Assume(FieldType),
}

impl Serialize for UnknownFieldType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UnknownFieldType::Reject => serializer.serialize_str("reject"),
            UnknownFieldType::Assume(t) => serializer.serialize_str(&t.to_string().to_lowercase()),
        }
    }
}

impl<'de> Deserialize<'de> for UnknownFieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.eq_ignore_ascii_case("reject") {
            return Ok(UnknownFieldType::Reject);
        }
        FieldType::from_str(&raw.to_uppercase())
            .map(UnknownFieldType::Assume)
            .map_err(|_| serde::de::Error::custom(format!("unknown field type policy '{}'", raw)))
    }
}

/// Normalization of upstream `field_type` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTypeRules {
    /// Accept `dimension` as well as `DIMENSION`
    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    /// Type given to legacy records without one; `None` rejects them
    #[serde(default)]
    pub missing_default: Option<FieldType>,

    #[serde(default = "default_unknown")]
    pub unknown: UnknownFieldType,
}

fn default_true() -> bool {
    true
}

fn default_unknown() -> UnknownFieldType {
    UnknownFieldType::Reject
}

impl Default for FieldTypeRules {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            missing_default: None,
            unknown: UnknownFieldType::Reject,
        }
    }
}

impl FieldTypeRules {
    pub fn resolve(&self, raw: Option<&str>) -> Result<FieldType, String> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty());
        let Some(raw) = raw else {
            return self
                .missing_default
                .ok_or_else(|| "field_type is missing".to_string());
        };

        let candidate = if self.case_insensitive {
            raw.to_uppercase()
        } else {
            raw.to_string()
        };
        match FieldType::from_str(&candidate) {
            Ok(field_type) => Ok(field_type),
            Err(_) => match self.unknown {
                UnknownFieldType::Assume(field_type) => Ok(field_type),
                UnknownFieldType::Reject => Err(format!("unknown field_type '{}'", raw)),
            },
        }
    }
}

/// Aliases arrive as a JSON list or a delimited string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AliasList {
    List(Vec<String>),
    Text(String),
}

impl AliasList {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            AliasList::List(items) => items,
            AliasList::Text(text) => {
                let text = text.trim();
                if text.starts_with('[') {
                    if let Ok(items) = serde_json::from_str::<Vec<String>>(text) {
                        return clean(items);
                    }
                }
                text.split([',', '，', ';', '；', '|'])
                    .map(str::to_string)
                    .collect()
            }
        };
        clean(items)
    }
}

fn clean(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Flags arrive as booleans, 0/1 or strings such as "是"/"否".
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Flag {
    fn value(&self) -> Option<bool> {
        match self {
            Flag::Bool(b) => Some(*b),
            Flag::Int(i) => Some(*i != 0),
            Flag::Text(s) => match s.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "y" | "是" | "on" | "enabled" => Some(true),
                "0" | "false" | "no" | "n" | "否" | "off" | "disabled" => Some(false),
                _ => None,
            },
        }
    }
}

/// Field row as served by the metadata API or a catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub column_name: String,
    #[serde(default, alias = "chinese_name")]
    pub display_name: String,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default, alias = "alias", alias = "synonyms")]
    aliases: Option<AliasList>,
    #[serde(default, alias = "column_comment")]
    pub description: Option<String>,
    #[serde(default, alias = "is_effect")]
    enabled: Option<Flag>,
    #[serde(default)]
    is_entity: Option<Flag>,
}

impl RawField {
    fn identity(&self) -> String {
        format!("{}.{}", self.table_name.trim(), self.column_name.trim())
    }

    pub fn into_record(self, rules: &FieldTypeRules) -> Result<FieldRecord, String> {
        let table = self.table_name.trim();
        let column = self.column_name.trim();
        let display = self.display_name.trim();
        if table.is_empty() || column.is_empty() {
            return Err("table_name and column_name are required".to_string());
        }
        if display.is_empty() {
            return Err("display_name is required".to_string());
        }

        let field_type = rules.resolve(self.field_type.as_deref())?;
        Ok(FieldRecord::new(table, column, display, field_type)
            .with_aliases(self.aliases.map(AliasList::into_vec).unwrap_or_default())
            .with_description(self.description.unwrap_or_default().trim())
            .with_enabled(self.enabled.and_then(|f| f.value()).unwrap_or(true))
            .with_entity(self.is_entity.and_then(|f| f.value()).unwrap_or(false)))
    }
}

/// Metric row as served upstream
#[derive(Debug, Clone, Deserialize)]
pub struct RawMetric {
    pub metric_id: Option<i64>,
    #[serde(default, alias = "metric_name")]
    pub name: String,
    #[serde(default, alias = "metric_alias")]
    aliases: Option<AliasList>,
    #[serde(default)]
    related_entities: Option<AliasList>,
    #[serde(default)]
    pub business_definition: Option<String>,
    #[serde(default)]
    depends_on_tables: Option<AliasList>,
    #[serde(default)]
    depends_on_columns: Option<AliasList>,
    #[serde(default, alias = "metric_sql")]
    pub expression: Option<String>,
}

impl RawMetric {
    pub fn into_record(self) -> Result<MetricRecord, String> {
        let id = self.metric_id.ok_or_else(|| "metric_id is required".to_string())?;
        let name = self.name.trim();
        if name.is_empty() {
            return Err("metric name is required".to_string());
        }

        let mut metric = MetricRecord::new(id, name)
            .with_aliases(self.aliases.map(AliasList::into_vec).unwrap_or_default())
            .with_definition(self.business_definition.unwrap_or_default().trim())
            .with_expression(self.expression.unwrap_or_default().trim());
        metric.related_entities = self.related_entities.map(AliasList::into_vec).unwrap_or_default();
        metric.depends_on_tables = self.depends_on_tables.map(AliasList::into_vec).unwrap_or_default();
        metric.depends_on_columns = self.depends_on_columns.map(AliasList::into_vec).unwrap_or_default();
        Ok(metric)
    }
}

/// Decode field rows, rejecting bad ones without failing the batch.
pub fn decode_fields(rows: Vec<serde_json::Value>, rules: &FieldTypeRules) -> Loaded<FieldRecord> {
    let mut loaded = Loaded::default();
    for (position, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<RawField>(row) {
            Ok(raw) => {
                let identity = raw.identity();
                match raw.into_record(rules) {
                    Ok(record) => loaded.records.push(record),
                    Err(reason) => loaded.reject(identity, reason),
                }
            }
            Err(e) => loaded.reject(format!("row {}", position), e.to_string()),
        }
    }
    loaded
}

pub fn decode_metrics(rows: Vec<serde_json::Value>) -> Loaded<MetricRecord> {
    let mut loaded = Loaded::default();
    for (position, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<RawMetric>(row) {
            Ok(raw) => {
                let identity = raw
                    .metric_id
                    .map(|id| format!("metric {}", id))
                    .unwrap_or_else(|| format!("row {}", position));
                match raw.into_record() {
                    Ok(record) => loaded.records.push(record),
                    Err(reason) => loaded.reject(identity, reason),
                }
            }
            Err(e) => loaded.reject(format!("row {}", position), e.to_string()),
        }
    }
    loaded
}

/// Fixed in-process catalog. Table ids index into the table list in order of
/// first appearance, starting at 1.
pub struct StaticMetadataSource {
    name: String,
    fields: Vec<FieldRecord>,
    metrics: Vec<MetricRecord>,
}

impl StaticMetadataSource {
    pub fn new(fields: Vec<FieldRecord>, metrics: Vec<MetricRecord>) -> Self {
        Self {
            name: "static".to_string(),
            fields,
            metrics,
        }
    }

    /// Build from a JSON document `{"fields": [...], "metrics": [...]}`.
    pub fn from_json(raw: &str, rules: &FieldTypeRules) -> SourceResult<(Self, Vec<RejectedRecord>)> {
        #[derive(Deserialize)]
        struct Document {
            #[serde(default)]
            fields: Vec<serde_json::Value>,
            #[serde(default)]
            metrics: Vec<serde_json::Value>,
        }

        let document: Document = serde_json::from_str(raw)
            .map_err(|e| crate::sources::SourceError::Malformed(e.to_string()))?;
        let fields = decode_fields(document.fields, rules);
        let metrics = decode_metrics(document.metrics);

        let mut rejected = fields.rejected;
        rejected.extend(metrics.rejected);
        Ok((Self::new(fields.records, metrics.records), rejected))
    }

    fn table_names(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for field in &self.fields {
            if !tables.contains(&field.table_name.as_str()) {
                tables.push(&field.table_name);
            }
        }
        tables
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_fields(&self, table_ids: Option<&[i64]>) -> SourceResult<Loaded<FieldRecord>> {
        let records = match table_ids {
            None => self.fields.clone(),
            Some(ids) => {
                let tables = self.table_names();
                let wanted: Vec<&str> = ids
                    .iter()
                    .filter_map(|id| usize::try_from(*id - 1).ok())
                    .filter_map(|i| tables.get(i).copied())
                    .collect();
                self.fields
                    .iter()
                    .filter(|f| wanted.contains(&f.table_name.as_str()))
                    .cloned()
                    .collect()
            }
        };
        Ok(Loaded {
            records,
            rejected: Vec::new(),
        })
    }

    async fn load_metrics(&self, metric_ids: Option<&[i64]>) -> SourceResult<Loaded<MetricRecord>> {
        let records = self
            .metrics
            .iter()
            .filter(|m| metric_ids.map_or(true, |ids| ids.contains(&m.metric_id)))
            .cloned()
            .collect();
        Ok(Loaded {
            records,
            rejected: Vec::new(),
        })
    }
}
