//! Single-flight sync of metadata, metrics and dimension values

use super::config::SyncConfig;
use super::error::{SyncError, SyncResult};
use crate::catalog::Catalog;
use crate::extraction::DimensionExtractor;
use crate::lifecycle::{IndexLifecycleManager, IndexUpdate};
use crate::metrics::{self, SYNC_REJECTED_TOTAL};
use crate::models::{CandidateId, CategoryStatus, IndexKind, SyncCategory, SyncParams, SyncStatus};
use crate::search::IndexDocument;
use crate::sources::{MetadataSource, SourceError};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// What one category left behind
struct CategoryRun {
    detail: Value,
    /// Set when some units failed but the category still made progress
    error: Option<String>,
}

impl CategoryRun {
    fn ok(detail: Value) -> Self {
        Self { detail, error: None }
    }
}

/// Clears `is_syncing` however the run ends, including cancellation.
struct SyncingGuard<'a> {
    status: &'a Mutex<SyncStatus>,
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.status.lock().is_syncing = false;
    }
}

pub struct SyncService {
    config: SyncConfig,
    metadata: Arc<dyn MetadataSource>,
    extractor: Option<Arc<DimensionExtractor>>,
    catalog: Arc<Catalog>,
    lifecycle: Arc<IndexLifecycleManager>,
    status: Mutex<SyncStatus>,
}

impl SyncService {
    pub fn new(
        config: SyncConfig,
        metadata: Arc<dyn MetadataSource>,
        extractor: Option<Arc<DimensionExtractor>>,
        catalog: Arc<Catalog>,
        lifecycle: Arc<IndexLifecycleManager>,
    ) -> Self {
        Self {
            config,
            metadata,
            extractor,
            catalog,
            lifecycle,
            status: Mutex::new(SyncStatus::default()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn status(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.status.lock().is_syncing
    }

    fn begin(&self) -> SyncResult<SyncingGuard<'_>> {
        let mut status = self.status.lock();
        if status.is_syncing {
            SYNC_REJECTED_TOTAL.inc();
            warn!("Sync already in progress, trigger rejected");
            return Err(SyncError::InProgress);
        }
        status.is_syncing = true;
        Ok(SyncingGuard { status: &self.status })
    }

    /// Run `category` now, or fail with [`SyncError::InProgress`] when a run
    /// is already active. Never queues.
    pub async fn trigger(&self, category: SyncCategory, params: SyncParams) -> SyncResult<SyncStatus> {
        let guard = self.begin()?;
        let started = Instant::now();
        info!(category = %category, force = params.force, "Sync started");

        let mut success = true;
        for step in category.expand() {
            let result = match step {
                SyncCategory::Metadata => self.sync_metadata(&params).await,
                SyncCategory::DimensionValues => self.sync_dimension_values(&params).await,
                SyncCategory::Metrics => self.sync_metrics(&params).await,
                SyncCategory::All => continue,
            };

            let status = match result {
                Ok(run) => {
                    if let Some(err) = &run.error {
                        warn!(category = %step, error = %err, "Sync category partially failed");
                    } else {
                        info!(category = %step, "Sync category finished");
                    }
                    CategoryStatus {
                        success: run.error.is_none(),
                        detail: run.detail,
                        error: run.error,
                        finished_at: Utc::now(),
                    }
                }
                Err(e) => {
                    error!(category = %step, error = %e, "Sync category failed");
                    CategoryStatus {
                        success: false,
                        detail: Value::Null,
                        error: Some(e.to_string()),
                        finished_at: Utc::now(),
                    }
                }
            };

            metrics::record_sync_run(&step.to_string(), status.success);
            success &= status.success;
            self.status.lock().set_category(step, status);
        }

        {
            let mut status = self.status.lock();
            status.last_sync_time = Some(Utc::now());
            status.success = Some(success);
        }
        drop(guard);

        info!(
            category = %category,
            success = success,
            duration_ms = started.elapsed().as_millis() as u64,
            "Sync finished"
        );
        Ok(self.status())
    }

    /// Entry point for the periodic job.
    pub async fn run_periodic(&self) -> SyncResult<SyncStatus> {
        let params = SyncParams {
            force: self.config.periodic_force,
            ..Default::default()
        };
        self.trigger(SyncCategory::All, params).await
    }

    async fn sync_metadata(&self, params: &SyncParams) -> SyncResult<CategoryRun> {
        let ids = params
            .table_ids
            .clone()
            .or_else(|| SyncConfig::ids(&self.config.table_ids));

        let loaded = self
            .config
            .retry
            .run(
                "load_fields",
                || self.metadata.load_fields(ids.as_deref()),
                SourceError::is_transient,
            )
            .await?;
        if loaded.records.is_empty() {
            return Err(SyncError::EmptySource("fields"));
        }

        let fields_loaded = loaded.records.len();
        let changed: Vec<IndexDocument> = loaded.records.iter().map(IndexDocument::from).collect();
        let removed = self.catalog.merge_fields(loaded.records, ids.is_some())?;
        let info = self
            .lifecycle
            .apply(IndexKind::Fields, self.update(IndexKind::Fields, changed, &removed), params.force)
            .await?;

        Ok(CategoryRun::ok(json!({
            "source": self.metadata.name(),
            "fields_loaded": fields_loaded,
            "fields_indexed": info.document_count,
            "fields_removed": removed.len(),
            "rejected": loaded.rejected,
            "generation": info.generation,
        })))
    }

    async fn sync_metrics(&self, params: &SyncParams) -> SyncResult<CategoryRun> {
        let ids = params
            .metric_ids
            .clone()
            .or_else(|| SyncConfig::ids(&self.config.metric_ids));

        let loaded = self
            .config
            .retry
            .run(
                "load_metrics",
                || self.metadata.load_metrics(ids.as_deref()),
                SourceError::is_transient,
            )
            .await?;
        if loaded.records.is_empty() {
            return Err(SyncError::EmptySource("metrics"));
        }

        let metrics_loaded = loaded.records.len();
        let changed: Vec<IndexDocument> = loaded.records.iter().map(IndexDocument::from).collect();
        let removed = self.catalog.replace_metrics(loaded.records, ids.is_some())?;
        let info = self
            .lifecycle
            .apply(IndexKind::Metrics, self.update(IndexKind::Metrics, changed, &removed), params.force)
            .await?;

        Ok(CategoryRun::ok(json!({
            "source": self.metadata.name(),
            "metrics_loaded": metrics_loaded,
            "metrics_indexed": info.document_count,
            "metrics_removed": removed.len(),
            "rejected": loaded.rejected,
            "generation": info.generation,
        })))
    }

    async fn sync_dimension_values(&self, params: &SyncParams) -> SyncResult<CategoryRun> {
        let extractor = match &self.extractor {
            Some(extractor) if extractor.is_enabled() => extractor,
            _ => {
                info!("Dimension extraction disabled, skipping");
                return Ok(CategoryRun::ok(json!({ "skipped": "dimension extraction disabled" })));
            }
        };

        let fields = self.catalog.dimension_fields();
        let extraction = extractor.extract(&fields).await;
        let summary = extraction.outcome.summary();

        // Nothing came back at all; keep serving the previous values
        if summary.succeeded == 0 && summary.failed > 0 {
            return Ok(CategoryRun {
                detail: json!({
                    "columns": summary,
                    "failed_columns": extraction.outcome.failed,
                }),
                error: Some(format!("all {} dimension columns failed", summary.failed)),
            });
        }

        let values_extracted = extraction.values.len();
        let changed: Vec<IndexDocument> = extraction.values.iter().map(IndexDocument::from).collect();
        let removed = self.catalog.replace_dimension_values(extraction.values)?;
        let info = self
            .lifecycle
            .apply(
                IndexKind::DimensionValues,
                self.update(IndexKind::DimensionValues, changed, &removed),
                params.force,
            )
            .await?;

        let error = (!extraction.outcome.success()).then(|| {
            format!(
                "{} of {} dimension columns failed",
                summary.failed, summary.total_requested
            )
        });
        Ok(CategoryRun {
            detail: json!({
                "columns": summary,
                "failed_columns": extraction.outcome.failed,
                "values_extracted": values_extracted,
                "values_indexed": info.document_count,
                "values_removed": removed.len(),
                "generation": info.generation,
            }),
            error,
        })
    }

    fn update(&self, kind: IndexKind, changed: Vec<IndexDocument>, removed: &[CandidateId]) -> IndexUpdate {
        IndexUpdate {
            full: self.catalog.snapshot().documents(kind),
            changed,
            removed_ids: removed.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldRecord, FieldType, MetricRecord};
    use crate::search::{IndexConfig, TantivyBackend};
    use crate::sources::StaticMetadataSource;

    fn service(fields: Vec<FieldRecord>, metrics: Vec<MetricRecord>) -> SyncService {
        let backend = TantivyBackend::open(IndexConfig::in_memory("t")).unwrap();
        SyncService::new(
            SyncConfig::default(),
            Arc::new(StaticMetadataSource::new(fields, metrics)),
            None,
            Arc::new(Catalog::default()),
            Arc::new(IndexLifecycleManager::new(Arc::new(backend), "t")),
        )
    }

    #[tokio::test]
    async fn test_all_records_each_category() {
        let service = service(
            vec![FieldRecord::new("dwd_order", "order_status", "订单状态", FieldType::Dimension)],
            vec![MetricRecord::new(1, "GMV")],
        );

        let status = service.trigger(SyncCategory::All, SyncParams::default()).await.unwrap();
        assert!(!status.is_syncing);
        assert_eq!(status.success, Some(true));
        assert_eq!(status.metadata.as_ref().unwrap().detail["fields_indexed"], 1);
        assert_eq!(status.metrics.as_ref().unwrap().detail["metrics_indexed"], 1);
        assert!(status.dimension_values.as_ref().unwrap().success);
        assert!(status.last_sync_time.is_some());
    }

    #[tokio::test]
    async fn test_failed_category_does_not_abort_others() {
        let service = service(Vec::new(), vec![MetricRecord::new(1, "GMV")]);

        let status = service.trigger(SyncCategory::All, SyncParams::default()).await.unwrap();
        assert_eq!(status.success, Some(false));
        assert!(!status.metadata.as_ref().unwrap().success);
        assert!(status.metrics.as_ref().unwrap().success);
    }

    #[test]
    fn test_guard_rejects_second_run() {
        let service = service(Vec::new(), Vec::new());
        let guard = service.begin().unwrap();
        assert!(matches!(service.begin(), Err(SyncError::InProgress)));
        drop(guard);
        assert!(!service.is_syncing());
        assert!(service.begin().is_ok());
    }
}
