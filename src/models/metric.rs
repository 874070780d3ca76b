use serde::{Deserialize, Serialize};

/// A named business measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub metric_id: i64,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub related_entities: Vec<String>,
    #[serde(default)]
    pub business_definition: String,
    #[serde(default)]
    pub depends_on_tables: Vec<String>,
    #[serde(default)]
    pub depends_on_columns: Vec<String>,
    /// Defining expression, e.g. `SUM(amount) / COUNT(DISTINCT user_id)`
    #[serde(default)]
    pub expression: String,
}

impl MetricRecord {
    pub fn new(metric_id: i64, name: impl Into<String>) -> Self {
        Self {
            metric_id,
            name: name.into(),
            aliases: Vec::new(),
            related_entities: Vec::new(),
            business_definition: String::new(),
            depends_on_tables: Vec::new(),
            depends_on_columns: Vec::new(),
            expression: String::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<impl Into<String>>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.business_definition = definition.into();
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }
}
