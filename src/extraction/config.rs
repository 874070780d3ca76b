//! Configuration for dimension value extraction

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Most frequent values kept per column
    #[serde(default = "default_max_values_per_column")]
    pub max_values_per_column: usize,

    /// Columns extracted concurrently; bounds load on source databases
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Deadline for one distinct-value query attempt
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Source used when no route prefix matches
    #[serde(default = "default_source")]
    pub default_source: String,

    /// Table-name prefix -> source name
    #[serde(default = "default_routes")]
    pub routes: BTreeMap<String, String>,

    /// Source name -> connection URL (`mysql://`, `postgres://`, `sqlite:`)
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_max_values_per_column() -> usize {
    1_000
}

fn default_pool_size() -> usize {
    4
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_source() -> String {
    "default".to_string()
}

fn default_routes() -> BTreeMap<String, String> {
    ["dwd_", "dim_", "ods_"]
        .into_iter()
        .map(|prefix| (prefix.to_string(), default_source()))
        .collect()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_values_per_column: default_max_values_per_column(),
            pool_size: default_pool_size(),
            query_timeout_secs: default_query_timeout_secs(),
            default_source: default_source(),
            routes: default_routes(),
            sources: BTreeMap::new(),
        }
    }
}

impl ExtractionConfig {
    /// Source for a table: the longest matching route prefix, else the default.
    pub fn route(&self, table_name: &str) -> &str {
        let table = table_name.to_ascii_lowercase();
        self.routes
            .iter()
            .filter(|(prefix, _)| table.starts_with(&prefix.to_ascii_lowercase()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, source)| source.as_str())
            .unwrap_or(&self.default_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_prefers_longest_prefix() {
        let mut config = ExtractionConfig::default();
        config.routes.insert("dwd_finance_".to_string(), "finance".to_string());

        assert_eq!(config.route("DWD_order"), "default");
        assert_eq!(config.route("dwd_finance_ledger"), "finance");
        assert_eq!(config.route("report_daily"), "default");

        config.default_source = "warehouse".to_string();
        assert_eq!(config.route("report_daily"), "warehouse");
    }
}
