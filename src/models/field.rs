use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Role a catalog column plays in the business model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
    Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Dimension,
    Metric,
    Attribute,
}

/// How a field type is materialized in the search indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIndexing {
    /// Distinct column values are extracted into the dimension value index
    pub as_dimension: bool,
    /// The column is surfaced as a measure candidate
    pub as_metric: bool,
}

impl FieldType {
    /// The single mapping from type to indexing behaviour. Call sites ask
    /// this table rather than comparing type names.
    pub const fn indexing(self) -> FieldIndexing {
        match self {
            FieldType::Dimension => FieldIndexing {
                as_dimension: true,
                as_metric: false,
            },
            FieldType::Metric => FieldIndexing {
                as_dimension: false,
                as_metric: true,
            },
            FieldType::Attribute => FieldIndexing {
                as_dimension: false,
                as_metric: false,
            },
        }
    }
}

/// Globally unique identity of a catalog field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey {
    pub table_name: String,
    pub column_name: String,
}

impl FieldKey {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table_name, self.column_name)
    }
}

/// A data-dictionary column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub table_name: String,
    pub column_name: String,
    pub display_name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub is_entity: bool,
}

fn default_enabled() -> bool {
    true
}

impl FieldRecord {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        display_name: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            display_name: display_name.into(),
            field_type,
            aliases: Vec::new(),
            description: String::new(),
            enabled: true,
            is_entity: false,
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<impl Into<String>>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_entity(mut self, is_entity: bool) -> Self {
        self.is_entity = is_entity;
        self
    }

    pub fn key(&self) -> FieldKey {
        FieldKey::new(&self.table_name, &self.column_name)
    }

    /// Enabled dimension columns are the only ones the extractor visits.
    pub fn is_extractable(&self) -> bool {
        self.enabled && self.field_type.indexing().as_dimension
    }
}
