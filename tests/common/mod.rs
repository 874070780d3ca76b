//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use metadata_discovery::config::Config;
use metadata_discovery::models::{CandidateRecord, FieldRecord, FieldType, IndexKind, MetricRecord};
use metadata_discovery::search::{
    FullTextBackend, FullTextHit, FullTextQuery, GenerationInfo, IndexConfig, IndexDocument, SearchError,
    SearchResult, TantivyBackend,
};
use metadata_discovery::sources::{Loaded, MetadataSource, SourceResult, StaticMetadataSource};
use metadata_discovery::DiscoveryService;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn order_status() -> FieldRecord {
    FieldRecord::new("dwd_order", "order_status", "订单状态", FieldType::Dimension)
        .with_aliases(vec!["状态"])
        .with_description("订单当前所处的状态")
}

pub fn sample_fields() -> Vec<FieldRecord> {
    vec![
        order_status(),
        FieldRecord::new("dwd_order", "pay_amount", "支付金额", FieldType::Metric)
            .with_aliases(vec!["实付金额"]),
        FieldRecord::new("dwd_order", "order_id", "订单编号", FieldType::Attribute),
        FieldRecord::new("dim_region", "city_name", "城市", FieldType::Dimension).with_entity(true),
    ]
}

pub fn sample_metrics() -> Vec<MetricRecord> {
    vec![
        MetricRecord::new(1, "GMV").with_aliases(vec!["成交额", "交易总额"]),
        MetricRecord::new(2, "客单价").with_definition("支付金额除以支付用户数"),
    ]
}

/// Default config with in-memory indices under `prefix`
pub fn in_memory_config(prefix: &str) -> Config {
    let mut config = Config::default();
    config.index = IndexConfig::in_memory(prefix);
    config.sync.retry.max_attempts = 1;
    config
}

pub fn build_service(prefix: &str, source: Arc<dyn MetadataSource>) -> DiscoveryService {
    let config = in_memory_config(prefix);
    let backend = TantivyBackend::open(config.index.clone()).expect("open backend");
    DiscoveryService::with_components(config, Arc::new(backend), source, None)
        .expect("build service")
}

pub fn static_service(prefix: &str) -> DiscoveryService {
    build_service(
        prefix,
        Arc::new(StaticMetadataSource::new(sample_fields(), sample_metrics())),
    )
}

/// Metadata source that sleeps before answering and counts calls
pub struct SlowSource {
    inner: StaticMetadataSource,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: StaticMetadataSource::new(sample_fields(), sample_metrics()),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    async fn load_fields(&self, table_ids: Option<&[i64]>) -> SourceResult<Loaded<FieldRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.load_fields(table_ids).await
    }

    async fn load_metrics(&self, metric_ids: Option<&[i64]>) -> SourceResult<Loaded<MetricRecord>> {
        self.inner.load_metrics(metric_ids).await
    }
}

/// Delegates to an in-memory index unless the kind is marked failing
pub struct FlakyBackend {
    inner: TantivyBackend,
    failing: Mutex<HashSet<IndexKind>>,
}

impl FlakyBackend {
    pub fn new(prefix: &str) -> Self {
        Self {
            inner: TantivyBackend::open(IndexConfig::in_memory(prefix)).expect("open backend"),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail(&self, kind: IndexKind) {
        self.failing.lock().insert(kind);
    }

    pub fn heal(&self, kind: IndexKind) {
        self.failing.lock().remove(&kind);
    }

    fn check(&self, kind: IndexKind) -> SearchResult<()> {
        if self.failing.lock().contains(&kind) {
            return Err(SearchError::IndexingFailed(format!("{} is unavailable", kind)));
        }
        Ok(())
    }
}

#[async_trait]
impl FullTextBackend for FlakyBackend {
    fn index_name(&self, kind: IndexKind) -> String {
        self.inner.index_name(kind)
    }

    async fn exists(&self, kind: IndexKind) -> SearchResult<bool> {
        self.inner.exists(kind).await
    }

    async fn current(&self, kind: IndexKind) -> SearchResult<Option<GenerationInfo>> {
        self.inner.current(kind).await
    }

    async fn create(&self, kind: IndexKind, force_recreate: bool) -> SearchResult<bool> {
        self.check(kind)?;
        self.inner.create(kind, force_recreate).await
    }

    async fn replace_all(&self, kind: IndexKind, documents: Vec<IndexDocument>) -> SearchResult<GenerationInfo> {
        self.check(kind)?;
        self.inner.replace_all(kind, documents).await
    }

    async fn upsert(
        &self,
        kind: IndexKind,
        documents: Vec<IndexDocument>,
        removed_ids: Vec<String>,
    ) -> SearchResult<GenerationInfo> {
        self.check(kind)?;
        self.inner.upsert(kind, documents, removed_ids).await
    }

    async fn delete(&self, kind: IndexKind) -> SearchResult<bool> {
        self.check(kind)?;
        self.inner.delete(kind).await
    }

    async fn count(&self, kind: IndexKind) -> SearchResult<u64> {
        self.inner.count(kind).await
    }

    async fn search(&self, kind: IndexKind, query: &FullTextQuery) -> SearchResult<Vec<FullTextHit>> {
        self.inner.search(kind, query).await
    }

    async fn records(&self, kind: IndexKind) -> SearchResult<Vec<CandidateRecord>> {
        self.inner.records(kind).await
    }
}

/// Static catalog whose field list can be swapped between syncs
pub struct EditableSource {
    fields: Mutex<Vec<FieldRecord>>,
    metrics: Vec<MetricRecord>,
}

impl EditableSource {
    pub fn new(fields: Vec<FieldRecord>, metrics: Vec<MetricRecord>) -> Self {
        Self {
            fields: Mutex::new(fields),
            metrics,
        }
    }

    pub fn set_fields(&self, fields: Vec<FieldRecord>) {
        *self.fields.lock() = fields;
    }

    fn snapshot(&self) -> StaticMetadataSource {
        StaticMetadataSource::new(self.fields.lock().clone(), self.metrics.clone())
    }
}

#[async_trait]
impl MetadataSource for EditableSource {
    fn name(&self) -> &str {
        "editable"
    }

    async fn load_fields(&self, table_ids: Option<&[i64]>) -> SourceResult<Loaded<FieldRecord>> {
        let source = self.snapshot();
        source.load_fields(table_ids).await
    }

    async fn load_metrics(&self, metric_ids: Option<&[i64]>) -> SourceResult<Loaded<MetricRecord>> {
        let source = self.snapshot();
        source.load_metrics(metric_ids).await
    }
}

/// Parse Prometheus exposition text into metric name -> lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            if let Some(name) = line.split_whitespace().nth(2) {
                current_metric = name.to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
