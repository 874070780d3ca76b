//! Operational surface of the discovery service
//!
//! [`DiscoveryService`] owns the catalog, the index lifecycle manager, the
//! search orchestration and the sync runner, and exposes the operations the
//! HTTP adapter and the scheduler call.

use crate::catalog::{Catalog, CatalogStats, TableSummary};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::extraction::{DimensionExtractor, FieldValidation, SourceHealth};
use crate::lifecycle::{CreateOutcome, CreateReport, DeleteReport, IndexLifecycleManager};
use crate::models::{
    IndexDescriptor, IndexKind, IndexSelection, Readiness, SyncCategory, SyncParams, SyncStatus,
};
use crate::outcome::BulkOutcome;
use crate::search::{
    ExtractedEntity, FullTextBackend, SearchRequest, SearchResponse, SearchService, Suggestion,
    TantivyBackend,
};
use crate::sources::{ApiMetadataSource, MetadataSource, StaticMetadataSource};
use crate::sync::SyncService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHealth {
    pub kind: IndexKind,
    pub readiness: Readiness,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub indices: Vec<IndexHealth>,
    pub is_syncing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub indices: Vec<IndexDescriptor>,
    pub catalog: CatalogStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesHealth {
    pub metadata_source: String,
    pub extraction_enabled: bool,
    pub sources: Vec<SourceHealth>,
    pub fields: Option<FieldValidation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndicesResponse {
    #[serde(flatten)]
    pub report: CreateReport,
    /// Present when the request loaded data from the upstream sources
    pub sync: Option<SyncStatus>,
}

fn category_for(kind: IndexKind) -> SyncCategory {
    match kind {
        IndexKind::Fields => SyncCategory::Metadata,
        IndexKind::DimensionValues => SyncCategory::DimensionValues,
        IndexKind::Metrics => SyncCategory::Metrics,
    }
}

pub struct DiscoveryService {
    config: Config,
    catalog: Arc<Catalog>,
    lifecycle: Arc<IndexLifecycleManager>,
    search: SearchService,
    sync: Arc<SyncService>,
    metadata: Arc<dyn MetadataSource>,
    extractor: Option<Arc<DimensionExtractor>>,
}

impl DiscoveryService {
    /// Build every component from configuration: the on-disk (or in-memory)
    /// index backend, the metadata source and the relational sources.
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate().map_err(AppError::Configuration)?;

        let backend = TantivyBackend::open(config.index.clone())?
            .with_snippet_chars(config.search.snippet_max_chars);

        let metadata: Arc<dyn MetadataSource> = if config.metadata_api.is_configured() {
            info!(base_url = %config.metadata_api.base_url, "Using metadata API source");
            Arc::new(ApiMetadataSource::new(
                config.metadata_api.clone(),
                config.field_types.clone(),
            )?)
        } else if let Some(path) = &config.metadata_api.static_catalog {
            let raw = tokio::fs::read_to_string(path).await?;
            let (source, rejected) = StaticMetadataSource::from_json(&raw, &config.field_types)?;
            for record in &rejected {
                warn!(record = ?record, "Static catalog record rejected");
            }
            info!(path = %path.display(), "Using static catalog source");
            Arc::new(source)
        } else {
            warn!("No metadata source configured, syncs will load nothing");
            Arc::new(StaticMetadataSource::new(Vec::new(), Vec::new()))
        };

        let extractor = if config.extraction.enabled && !config.extraction.sources.is_empty() {
            Some(Arc::new(DimensionExtractor::connect(
                config.extraction.clone(),
                config.sync.retry.clone(),
            )?))
        } else {
            info!("Dimension extraction has no sources, values will not be extracted");
            None
        };

        Self::with_components(config, Arc::new(backend), metadata, extractor)
    }

    /// Assemble the service around already-built boundaries.
    pub fn with_components(
        config: Config,
        backend: Arc<dyn FullTextBackend>,
        metadata: Arc<dyn MetadataSource>,
        extractor: Option<Arc<DimensionExtractor>>,
    ) -> Result<Self> {
        let catalog = Arc::new(Catalog::new(config.pattern.clone()));
        let lifecycle = Arc::new(IndexLifecycleManager::new(backend, config.index.prefix.clone()));
        let search = SearchService::new(
            config.search.clone(),
            catalog.clone(),
            lifecycle.clone(),
            config.index.auto_initialize,
        )?;
        let sync = Arc::new(SyncService::new(
            config.sync.clone(),
            metadata.clone(),
            extractor.clone(),
            catalog.clone(),
            lifecycle.clone(),
        ));

        Ok(Self {
            config,
            catalog,
            lifecycle,
            search,
            sync,
            metadata,
            extractor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lifecycle(&self) -> &Arc<IndexLifecycleManager> {
        &self.lifecycle
    }

    pub fn sync_service(&self) -> &Arc<SyncService> {
        &self.sync
    }

    /// Adopt indices left by a previous process and reload the catalog from
    /// them. Returns the recovered kinds.
    pub async fn start(&self) -> Result<Vec<IndexKind>> {
        let recovered = self.lifecycle.recover().await?;
        for kind in &recovered {
            let records = self.lifecycle.backend().records(*kind).await?;
            match self.catalog.restore(records) {
                Ok(count) => info!(index = %kind, records = count, "Catalog restored from index"),
                Err(e) => warn!(index = %kind, error = %e, "Catalog restore failed"),
            }
        }
        Ok(recovered)
    }

    pub fn health(&self) -> ServiceHealth {
        ServiceHealth {
            indices: IndexKind::all()
                .into_iter()
                .map(|kind| IndexHealth {
                    kind,
                    readiness: self.lifecycle.readiness(kind),
                })
                .collect(),
            is_syncing: self.sync.is_syncing(),
        }
    }

    /// Create the three indices.
    ///
    /// Without `auto_load_data` each index is built from the records the
    /// catalog already holds. With it, a full sync loads fresh data first and
    /// builds the indices on the way.
    pub async fn create_indices(
        &self,
        force_recreate: bool,
        auto_load_data: bool,
    ) -> Result<CreateIndicesResponse> {
        let was_ready: Vec<(IndexKind, bool)> = IndexKind::all()
            .into_iter()
            .map(|kind| (kind, self.lifecycle.readiness(kind) == Readiness::Ready))
            .collect();

        let sync = if auto_load_data {
            let params = SyncParams {
                force: force_recreate,
                ..Default::default()
            };
            Some(self.sync.trigger(SyncCategory::All, params).await?)
        } else {
            None
        };

        let mut outcome = BulkOutcome::new();
        for (kind, ready_before) in was_ready {
            if let Some(status) = &sync {
                if let Some(category) = status.category(category_for(kind)) {
                    if !category.success {
                        let error = category.error.clone().unwrap_or_else(|| "sync failed".to_string());
                        outcome.fail(kind, error);
                        continue;
                    }
                }
                if ready_before && !force_recreate {
                    outcome.skip(kind, "index already ready, data refreshed");
                    continue;
                }
                if self.lifecycle.readiness(kind) == Readiness::Ready {
                    outcome.succeed(kind);
                    continue;
                }
            }

            let documents = self.catalog.snapshot().documents(kind);
            match self.lifecycle.create_or_recreate(kind, documents, force_recreate).await {
                Ok(CreateOutcome::Created { .. }) => outcome.succeed(kind),
                Ok(CreateOutcome::AlreadyReady) => outcome.skip(kind, "index already ready"),
                Err(e) => outcome.fail(kind, e),
            }
        }

        let report = CreateReport::from(outcome);
        info!(
            created = report.summary.succeeded,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "Index creation finished"
        );
        Ok(CreateIndicesResponse { report, sync })
    }

    pub async fn delete_indices(&self, selection: IndexSelection, confirm: bool) -> Result<DeleteReport> {
        Ok(self.lifecycle.delete_all(selection, confirm).await?)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        Ok(self.search.search(request).await?)
    }

    pub async fn suggest(&self, prefix: &str, size: Option<usize>) -> Result<Vec<Suggestion>> {
        Ok(self.search.suggest(prefix, size).await?)
    }

    pub fn extract(&self, text: &str) -> Vec<ExtractedEntity> {
        self.search.extract_entities(text)
    }

    pub fn tables(&self) -> Vec<TableSummary> {
        self.catalog.tables()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            indices: self.lifecycle.descriptors(),
            catalog: self.catalog.stats(),
        }
    }

    pub async fn sync(&self, category: SyncCategory, params: SyncParams) -> Result<SyncStatus> {
        Ok(self.sync.trigger(category, params).await?)
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    pub async fn sources_health(&self) -> SourcesHealth {
        let (sources, fields) = match &self.extractor {
            Some(extractor) => {
                let sources = extractor.test_connections().await;
                let fields = extractor
                    .validate_dimension_fields(&self.catalog.dimension_fields())
                    .await;
                (sources, Some(fields))
            }
            None => (Vec::new(), None),
        };

        SourcesHealth {
            metadata_source: self.metadata.name().to_string(),
            extraction_enabled: self.extractor.as_ref().is_some_and(|e| e.is_enabled()),
            sources,
            fields,
        }
    }
}
