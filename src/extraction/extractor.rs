//! Bounded, parallel extraction of distinct dimension values

use super::config::ExtractionConfig;
use crate::metrics;
use crate::models::{DimensionValueRecord, FieldKey, FieldRecord};
use crate::outcome::BulkOutcome;
use crate::retry::RetryPolicy;
use crate::sources::{RelationalSource, SourceError, SourceResult, SqlSource};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Values extracted in one run plus the per-column accounting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub values: Vec<DimensionValueRecord>,
    pub outcome: BulkOutcome<FieldKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    pub name: String,
    pub connected: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCheck {
    pub table_name: String,
    pub column_name: String,
    pub source: String,
    pub valid: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    pub total_fields: usize,
    pub valid_fields: usize,
    pub invalid_fields: usize,
    pub details: Vec<FieldCheck>,
}

pub struct DimensionExtractor {
    config: ExtractionConfig,
    sources: HashMap<String, Arc<dyn RelationalSource>>,
    retry: RetryPolicy,
}

impl DimensionExtractor {
    /// Open a lazy pool for every configured source. Nothing is dialed yet.
    pub fn connect(config: ExtractionConfig, retry: RetryPolicy) -> SourceResult<Self> {
        let timeout = Duration::from_secs(config.query_timeout_secs.max(1));
        let max_connections = u32::try_from(config.pool_size.max(1)).unwrap_or(u32::MAX);

        let mut sources: HashMap<String, Arc<dyn RelationalSource>> = HashMap::new();
        for (name, url) in &config.sources {
            let source = SqlSource::connect_lazy(name.clone(), url, max_connections, timeout)?;
            info!(source = %name, dialect = ?source.dialect(), "Configured relational source");
            sources.insert(name.clone(), Arc::new(source));
        }

        Ok(Self::with_sources(config, sources, retry))
    }

    pub fn with_sources(
        config: ExtractionConfig,
        sources: HashMap<String, Arc<dyn RelationalSource>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            config,
            sources,
            retry,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn source_for(&self, table_name: &str) -> (String, Option<Arc<dyn RelationalSource>>) {
        let name = self.config.route(table_name).to_string();
        let source = self.sources.get(&name).cloned();
        (name, source)
    }

    /// Extract values for every extractable field in `fields`.
    ///
    /// A failing column is recorded and left out; the others still finish.
    pub async fn extract(&self, fields: &[FieldRecord]) -> Extraction {
        let targets: Vec<FieldRecord> = fields.iter().filter(|f| f.is_extractable()).cloned().collect();
        let started = Instant::now();
        info!(
            columns = targets.len(),
            pool_size = self.config.pool_size.max(1),
            "Extracting dimension values"
        );

        let results: Vec<(FieldKey, SourceResult<Vec<DimensionValueRecord>>)> = stream::iter(targets)
            .map(|field| async move {
                let result = self.extract_column(&field).await;
                (field.key(), result)
            })
            .buffer_unordered(self.config.pool_size.max(1))
            .collect()
            .await;

        let mut outcome = BulkOutcome::new();
        let mut values = Vec::new();
        for (key, result) in results {
            match result {
                Ok(records) => {
                    values.extend(records);
                    outcome.succeed(key);
                }
                Err(SourceError::UnknownSource(source)) => {
                    warn!(column = %key, source = %source, "No source configured for column");
                    outcome.fail(key, format!("source '{}' is not configured", source));
                }
                Err(e) => {
                    warn!(column = %key, error = %e, "Dimension extraction failed for column");
                    outcome.fail(key, e);
                }
            }
        }

        // Completion order is arbitrary; keep the output stable
        values.sort_by(|a, b| {
            a.field_key()
                .cmp(&b.field_key())
                .then(b.frequency.cmp(&a.frequency))
                .then_with(|| a.value.cmp(&b.value))
        });
        outcome.succeeded.sort();
        outcome.failed.sort_by(|a, b| a.unit.cmp(&b.unit));

        let summary = outcome.summary();
        metrics::record_extraction(summary.succeeded, summary.failed, summary.skipped);
        info!(
            values = values.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Dimension extraction finished"
        );

        Extraction { values, outcome }
    }

    async fn extract_column(&self, field: &FieldRecord) -> SourceResult<Vec<DimensionValueRecord>> {
        let (source_name, source) = self.source_for(&field.table_name);
        let source = source.ok_or(SourceError::UnknownSource(source_name))?;
        let max = self.config.max_values_per_column;
        let timeout = Duration::from_secs(self.config.query_timeout_secs.max(1));
        let operation = format!("distinct_values {}", field.key());

        let raw = self
            .retry
            .run(
                &operation,
                || {
                    let source = Arc::clone(&source);
                    async move {
                        match tokio::time::timeout(
                            timeout,
                            source.distinct_values(&field.table_name, &field.column_name, max),
                        )
                        .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(SourceError::Timeout(format!(
                                "{} after {}s",
                                field.key(),
                                timeout.as_secs()
                            ))),
                        }
                    }
                },
                SourceError::is_transient,
            )
            .await?;

        let values = normalize_values(raw, max);
        debug!(column = %field.key(), values = values.len(), "Extracted column");
        Ok(values
            .into_iter()
            .map(|(value, frequency)| DimensionValueRecord::new(field, value, frequency))
            .collect())
    }

    /// Run a trivial query against every configured source.
    pub async fn test_connections(&self) -> Vec<SourceHealth> {
        let timeout = Duration::from_secs(self.config.query_timeout_secs.max(1));
        let mut names: Vec<&String> = self.sources.keys().collect();
        names.sort();

        let mut report = Vec::with_capacity(names.len());
        for name in names {
            let result = match self.sources.get(name) {
                Some(source) => tokio::time::timeout(timeout, source.ping())
                    .await
                    .unwrap_or_else(|_| Err(SourceError::Timeout(name.clone()))),
                None => Err(SourceError::UnknownSource(name.clone())),
            };
            report.push(SourceHealth {
                name: name.clone(),
                connected: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        }
        report
    }

    /// Check that every dimension column resolves in its routed source.
    pub async fn validate_dimension_fields(&self, fields: &[FieldRecord]) -> FieldValidation {
        let mut details = Vec::new();
        for field in fields.iter().filter(|f| f.field_type.indexing().as_dimension) {
            let (source_name, source) = self.source_for(&field.table_name);
            let error = match source {
                None => Some(format!("source '{}' is not configured", source_name)),
                Some(source) => source
                    .check_column(&field.table_name, &field.column_name)
                    .await
                    .err()
                    .map(|e| e.to_string()),
            };
            details.push(FieldCheck {
                table_name: field.table_name.clone(),
                column_name: field.column_name.clone(),
                source: source_name,
                valid: error.is_none(),
                error,
            });
        }

        let valid_fields = details.iter().filter(|d| d.valid).count();
        FieldValidation {
            total_fields: details.len(),
            valid_fields,
            invalid_fields: details.len() - valid_fields,
            details,
        }
    }
}

/// Trim, drop empties, merge values that collide after trimming, keep the
/// `max` most frequent.
pub fn normalize_values(raw: Vec<(String, u64)>, max: usize) -> Vec<(String, u64)> {
    let mut merged: HashMap<String, u64> = HashMap::new();
    for (value, frequency) in raw {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        *merged.entry(value.to_string()).or_insert(0) += frequency;
    }

    let mut values: Vec<(String, u64)> = merged.into_iter().collect();
    values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    values.truncate(max);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RelationalSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn distinct_values(&self, _table: &str, column: &str, _max: usize) -> SourceResult<Vec<(String, u64)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match column {
                "broken" => Err(SourceError::Query("no such column: broken".to_string())),
                _ => Ok(vec![
                    ("已完成".to_string(), 10),
                    (" 已完成 ".to_string(), 5),
                    ("".to_string(), 3),
                    ("已取消".to_string(), 2),
                ]),
            }
        }

        async fn row_count(&self, _table: &str) -> SourceResult<u64> {
            Ok(20)
        }

        async fn ping(&self) -> SourceResult<()> {
            Ok(())
        }

        async fn check_column(&self, _table: &str, column: &str) -> SourceResult<()> {
            if column == "broken" {
                Err(SourceError::Query("no such column".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn extractor() -> (DimensionExtractor, Arc<FakeSource>) {
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
        });
        let mut sources: HashMap<String, Arc<dyn RelationalSource>> = HashMap::new();
        sources.insert("default".to_string(), source.clone());
        (
            DimensionExtractor::with_sources(ExtractionConfig::default(), sources, RetryPolicy::no_retry()),
            source,
        )
    }

    #[test]
    fn test_normalize_values() {
        let values = normalize_values(
            vec![
                ("a".to_string(), 1),
                (" a".to_string(), 2),
                ("   ".to_string(), 9),
                ("b".to_string(), 5),
                ("c".to_string(), 1),
            ],
            2,
        );
        assert_eq!(values, vec![("b".to_string(), 5), ("a".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_failed_column_is_isolated() {
        let (extractor, source) = extractor();
        let fields = vec![
            FieldRecord::new("dwd_order", "order_status", "订单状态", FieldType::Dimension),
            FieldRecord::new("dwd_order", "broken", "坏列", FieldType::Dimension),
            FieldRecord::new("dwd_order", "amount", "金额", FieldType::Metric),
        ];

        let extraction = extractor.extract(&fields).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(extraction.outcome.succeeded, vec![FieldKey::new("dwd_order", "order_status")]);
        assert_eq!(extraction.outcome.failed.len(), 1);
        assert_eq!(extraction.values.len(), 2);
        assert_eq!(extraction.values[0].value, "已完成");
        assert_eq!(extraction.values[0].frequency, 15);
    }

    #[tokio::test]
    async fn test_unrouted_source_fails_column() {
        let (mut extractor, _) = extractor();
        extractor.config.default_source = "missing".to_string();
        extractor.config.routes.clear();

        let fields = vec![FieldRecord::new("report", "region", "区域", FieldType::Dimension)];
        let extraction = extractor.extract(&fields).await;
        assert!(extraction.values.is_empty());
        assert!(extraction.outcome.failed[0].error.contains("missing"));
    }

    #[tokio::test]
    async fn test_validate_dimension_fields() {
        let (extractor, _) = extractor();
        let fields = vec![
            FieldRecord::new("dwd_order", "order_status", "订单状态", FieldType::Dimension),
            FieldRecord::new("dwd_order", "broken", "坏列", FieldType::Dimension),
        ];
        let report = extractor.validate_dimension_fields(&fields).await;
        assert_eq!(report.total_fields, 2);
        assert_eq!(report.valid_fields, 1);
        assert!(!report.details[1].valid);

        let health = extractor.test_connections().await;
        assert_eq!(health.len(), 1);
        assert!(health[0].connected);
    }
}
