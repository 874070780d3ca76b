//! Search orchestration across the three matching engines

use crate::catalog::{Catalog, CatalogSnapshot};
use crate::lifecycle::IndexLifecycleManager;
use crate::matcher::{Normalization, SimilarityMatcher, SimilarityTarget};
use crate::metrics;
use crate::models::{CandidateId, CandidateRecord, Engine, FieldRecord, IndexKind, Readiness, SearchCandidate};
use crate::search::config::{Analyzer, SearchConfig};
use crate::search::error::{SearchError, SearchResult};
use crate::search::fusion::{FusedResult, HybridFuser};
use crate::search::query::{FullTextQuery, SearchFilter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::{Display, EnumString};
use tracing::{debug, warn};

/// How a search request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchMethod {
    /// All three engines over all indices, fused
    #[default]
    Hybrid,
    /// Full-text relevance only
    Fulltext,
    /// Exact multi-pattern matching only
    Pattern,
    /// Fuzzy similarity only
    Similarity,
    /// Dimension value index, most frequent values first
    DimensionValues,
    /// All three engines restricted to metrics
    Metrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub method: SearchMethod,
    #[serde(default)]
    pub filters: SearchFilter,
    /// Defaults to the configured tokenize mode
    #[serde(default)]
    pub tokenize: Option<bool>,
    #[serde(default)]
    pub analyzer: Option<Analyzer>,
    #[serde(default)]
    pub size: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, method: SearchMethod) -> Self {
        Self {
            query: query.into(),
            method,
            filters: SearchFilter::default(),
            tokenize: None,
            analyzer: None,
            size: None,
        }
    }

    pub fn with_filters(mut self, filters: SearchFilter) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_tokenize(mut self, tokenize: bool) -> Self {
        self.tokenize = Some(tokenize);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// An engine that errored or ran out of time; the rest still answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFailure {
    pub engine: Engine,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub method: SearchMethod,
    pub total: usize,
    pub results: Vec<FusedResult>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failed_engines: Vec<EngineFailure>,
    pub took_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub value: String,
    pub table: Option<String>,
    pub score: f64,
    pub engines: Vec<Engine>,
}

/// An entity mention found in free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Matched text as registered in the catalog
    pub text: String,
    /// Display name of the entity field
    pub entity_type: String,
    pub table_name: String,
    pub column_name: String,
    /// Concrete value when the mention is a dimension value
    pub value: Option<String>,
    /// Char offsets into the input
    pub span: Range<usize>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy)]
struct Engines {
    fulltext: bool,
    pattern: bool,
    similarity: bool,
}

impl Engines {
    const ALL: Engines = Engines {
        fulltext: true,
        pattern: true,
        similarity: true,
    };

    fn only(engine: Engine) -> Self {
        Engines {
            fulltext: engine.scoring() == Engine::Fulltext,
            pattern: engine == Engine::Pattern,
            similarity: engine == Engine::Similarity,
        }
    }
}

/// Normalized inputs shared by the engines of one request
struct Plan<'a> {
    query: &'a str,
    filters: &'a SearchFilter,
    kinds: &'a [IndexKind],
    tokenize: bool,
    analyzer: Analyzer,
    fetch: usize,
    /// Label for index hits; `DimensionValues` also collects by frequency
    fulltext_as: Engine,
}

type EngineOutput = (Vec<SearchCandidate>, Vec<EngineFailure>);

pub struct SearchService {
    config: SearchConfig,
    auto_initialize: bool,
    catalog: Arc<Catalog>,
    lifecycle: Arc<IndexLifecycleManager>,
    fuser: HybridFuser,
    similarity: SimilarityMatcher,
}

impl SearchService {
    pub fn new(
        config: SearchConfig,
        catalog: Arc<Catalog>,
        lifecycle: Arc<IndexLifecycleManager>,
        auto_initialize: bool,
    ) -> SearchResult<Self> {
        config.validate().map_err(SearchError::InvalidConfiguration)?;
        let normalization = catalog.normalization();

        Ok(Self {
            fuser: HybridFuser::new(config.weights, config.normalization),
            similarity: SimilarityMatcher::new(normalization, config.similarity_max_candidates),
            config,
            auto_initialize,
            catalog,
            lifecycle,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn resolve_size(&self, size: Option<usize>) -> SearchResult<usize> {
        let size = size.unwrap_or(self.config.default_size);
        if size == 0 || size > self.config.max_size {
            return Err(SearchError::InvalidRequest(format!(
                "size must be within 1..={}, got {}",
                self.config.max_size, size
            )));
        }
        Ok(size)
    }

    pub async fn search(&self, request: &SearchRequest) -> SearchResult<SearchResponse> {
        let started = Instant::now();
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidRequest("query must not be empty".to_string()));
        }
        let size = self.resolve_size(request.size)?;
        let fetch = size.saturating_mul(self.config.fetch_multiplier.max(1));

        let (engines, kinds): (Engines, &[IndexKind]) = match request.method {
            SearchMethod::Hybrid => (Engines::ALL, &ALL_KINDS),
            SearchMethod::Fulltext => (Engines::only(Engine::Fulltext), &ALL_KINDS),
            SearchMethod::Pattern => (Engines::only(Engine::Pattern), &ALL_KINDS),
            SearchMethod::Similarity => (Engines::only(Engine::Similarity), &ALL_KINDS),
            SearchMethod::DimensionValues => (Engines::only(Engine::DimensionValues), &[IndexKind::DimensionValues]),
            SearchMethod::Metrics => (Engines::ALL, &[IndexKind::Metrics]),
        };

        let plan = Plan {
            query,
            filters: &request.filters,
            kinds,
            // Whole-value matching suits dimension values unless asked otherwise
            tokenize: request.tokenize.unwrap_or(match request.method {
                SearchMethod::DimensionValues => false,
                _ => self.config.default_tokenize,
            }),
            analyzer: request.analyzer.unwrap_or(self.config.default_analyzer),
            fetch,
            fulltext_as: match request.method {
                SearchMethod::DimensionValues => Engine::DimensionValues,
                _ => Engine::Fulltext,
            },
        };

        let (candidates, failed_engines) = self.run_engines(&plan, engines).await;
        let results = match request.method {
            SearchMethod::DimensionValues => self.fuser.fuse_by_frequency(candidates, size),
            _ => self.fuser.fuse(candidates, size),
        };

        let elapsed = started.elapsed();
        metrics::record_search(&request.method.to_string(), elapsed);
        debug!(
            query = %query,
            method = %request.method,
            results = results.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Search completed"
        );

        Ok(SearchResponse {
            query: query.to_string(),
            method: request.method,
            total: results.len(),
            results,
            failed_engines,
            took_ms: elapsed.as_millis() as u64,
        })
    }

    /// Run the selected engines concurrently, each under its own deadline.
    async fn run_engines(&self, plan: &Plan<'_>, engines: Engines) -> EngineOutput {
        let timeout = Duration::from_millis(self.config.engine_timeout_ms.max(1));

        let (fulltext, pattern, similarity) = tokio::join!(
            guarded(plan.fulltext_as, engines.fulltext, timeout, self.fulltext_engine(plan)),
            guarded(Engine::Pattern, engines.pattern, timeout, async {
                Ok((self.pattern_engine(plan), Vec::new()))
            }),
            guarded(Engine::Similarity, engines.similarity, timeout, async {
                self.similarity_engine(plan).map(|hits| (hits, Vec::new()))
            }),
        );

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for (hits, failed) in [fulltext, pattern, similarity] {
            candidates.extend(hits);
            failures.extend(failed);
        }
        (candidates, failures)
    }

    async fn fulltext_engine(&self, plan: &Plan<'_>) -> SearchResult<EngineOutput> {
        let mut query = FullTextQuery::new(plan.query)
            .with_filters(plan.filters.clone())
            .with_tokenize(plan.tokenize)
            .with_analyzer(plan.analyzer)
            .with_limit(plan.fetch);
        if plan.fulltext_as == Engine::DimensionValues {
            query = query.with_frequency_order();
        }

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for &kind in plan.kinds {
            if !self.ensure_ready(kind).await {
                debug!(index = %kind, "Index absent, skipped");
                continue;
            }
            match self.lifecycle.backend().search(kind, &query).await {
                Ok(hits) => candidates.extend(hits.into_iter().map(|hit| {
                    let candidate = SearchCandidate::new(hit.record, plan.fulltext_as, hit.score);
                    match hit.snippet {
                        Some(snippet) => candidate.with_snippet(snippet),
                        None => candidate,
                    }
                })),
                Err(e) => {
                    warn!(index = %kind, error = %e, "Full-text lookup failed");
                    metrics::record_engine_failure(&plan.fulltext_as.to_string());
                    failures.push(EngineFailure {
                        engine: plan.fulltext_as,
                        error: format!("{}: {}", kind, e),
                    });
                }
            }
        }
        Ok((candidates, failures))
    }

    fn pattern_engine(&self, plan: &Plan<'_>) -> Vec<SearchCandidate> {
        let snapshot = self.catalog.snapshot();
        snapshot
            .pattern_matches(plan.query)
            .into_iter()
            .filter(|m| plan.kinds.contains(&kind_of(&m.reference)))
            .filter_map(|m| {
                let record = snapshot.get(&m.reference)?;
                accepts(plan.filters, &record)
                    .then(|| SearchCandidate::new(record, Engine::Pattern, m.score).with_snippet(m.pattern))
            })
            .take(plan.fetch)
            .collect()
    }

    /// Fuzzy scoring over a pool of at most `similarity_max_candidates`.
    fn similarity_engine(&self, plan: &Plan<'_>) -> SearchResult<Vec<SearchCandidate>> {
        let snapshot = self.catalog.snapshot();
        let pool = similarity_pool(
            &snapshot,
            plan,
            self.catalog.normalization(),
            self.similarity.max_candidates(),
        );

        let ranked = self
            .similarity
            .rank(plan.query, &pool, self.config.similarity_threshold, plan.tokenize)
            .map_err(|e| SearchError::SearchFailed(e.to_string()))?;

        Ok(ranked
            .into_iter()
            .take(plan.fetch)
            .filter_map(|m| {
                pool.get(m.index).cloned().map(|record| {
                    SearchCandidate::new(record, Engine::Similarity, m.score).with_snippet(m.matched_text)
                })
            })
            .collect())
    }

    /// READY, or re-initialized from the catalog when allowed.
    async fn ensure_ready(&self, kind: IndexKind) -> bool {
        if self.lifecycle.readiness(kind) == Readiness::Ready {
            return true;
        }
        if !self.auto_initialize || !self.lifecycle.try_claim_initialization(kind) {
            return false;
        }

        let documents = self.catalog.snapshot().documents(kind);
        match self.lifecycle.create_or_recreate(kind, documents, false).await {
            Ok(_) => true,
            Err(e) => {
                warn!(index = %kind, error = %e, "Auto-initialization failed");
                false
            }
        }
    }

    /// Hybrid suggestions for a typed prefix.
    pub async fn suggest(&self, prefix: &str, size: Option<usize>) -> SearchResult<Vec<Suggestion>> {
        let mut request = SearchRequest::new(prefix, SearchMethod::Hybrid);
        request.size = size;
        let response = self.search(&request).await?;

        Ok(response
            .results
            .into_iter()
            .map(|result| Suggestion {
                text: result.record.label().to_string(),
                value: suggestion_value(&result.record),
                table: result.record.table_name().map(str::to_string),
                score: result.score,
                engines: result.engines,
            })
            .collect())
    }

    /// Entity fields and entity values mentioned in `text`, most confident first.
    pub fn extract_entities(&self, text: &str) -> Vec<ExtractedEntity> {
        let snapshot = self.catalog.snapshot();
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for m in snapshot.pattern_matches(text) {
            let (field, value): (&FieldRecord, Option<String>) = match &m.reference {
                CandidateId::Field(key) => match snapshot.fields.get(key) {
                    Some(field) => (field, None),
                    None => continue,
                },
                CandidateId::DimensionValue(hash) => match snapshot.dimension_values.get(hash) {
                    Some(record) => (&record.field, Some(record.value.clone())),
                    None => continue,
                },
                CandidateId::Metric(_) => continue,
            };
            if !field.is_entity || !seen.insert(m.pattern.clone()) {
                continue;
            }
            entities.push(ExtractedEntity {
                text: m.pattern.clone(),
                entity_type: field.display_name.clone(),
                table_name: field.table_name.clone(),
                column_name: field.column_name.clone(),
                value,
                span: m.span.clone(),
                confidence: m.score / 10.0,
            });
        }

        entities.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        entities
    }
}

const ALL_KINDS: [IndexKind; 3] = [IndexKind::Fields, IndexKind::DimensionValues, IndexKind::Metrics];

/// Apply `enabled` and the deadline to one engine, folding errors into failures.
async fn guarded<F>(engine: Engine, enabled: bool, timeout: Duration, run: F) -> EngineOutput
where
    F: Future<Output = SearchResult<EngineOutput>>,
{
    if !enabled {
        return (Vec::new(), Vec::new());
    }
    let error = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => return output,
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("{} engine exceeded {}ms", engine, timeout.as_millis()),
    };
    warn!(engine = %engine, error = %error, "Engine failed, continuing without it");
    metrics::record_engine_failure(&engine.to_string());
    (Vec::new(), vec![EngineFailure { engine, error }])
}

/// Pattern hits first, then the records sharing the most distinct chars
/// with the query, up to `bound`. A record sharing no char with the query
/// scores zero, so it never enters the pool.
fn similarity_pool(
    snapshot: &CatalogSnapshot,
    plan: &Plan<'_>,
    normalization: Normalization,
    bound: usize,
) -> Vec<CandidateRecord> {
    let query_chars: HashSet<char> = normalization
        .apply(plan.query)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let mut pool = Vec::new();
    let mut taken = BTreeSet::new();
    for m in snapshot.pattern_matches(plan.query) {
        if pool.len() >= bound {
            return pool;
        }
        if !plan.kinds.contains(&kind_of(&m.reference)) || taken.contains(&m.reference) {
            continue;
        }
        if let Some(record) = snapshot.get(&m.reference) {
            if accepts(plan.filters, &record) {
                taken.insert(m.reference);
                pool.push(record);
            }
        }
    }

    let mut ranked: Vec<(usize, CandidateRecord)> = [IndexKind::Fields, IndexKind::Metrics, IndexKind::DimensionValues]
        .into_iter()
        .filter(|kind| plan.kinds.contains(kind))
        .flat_map(|kind| snapshot.records(kind))
        .filter(|record| accepts(plan.filters, record) && !taken.contains(&record.id()))
        .filter_map(|record| {
            let shared = shared_chars(&query_chars, &record, normalization);
            (shared > 0).then_some((shared, record))
        })
        .collect();
    // Stable: equal overlap keeps catalog order
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let room = bound.saturating_sub(pool.len());
    pool.extend(ranked.into_iter().take(room).map(|(_, record)| record));
    pool
}

fn shared_chars(query_chars: &HashSet<char>, record: &CandidateRecord, normalization: Normalization) -> usize {
    let mut seen: HashSet<char> = HashSet::new();
    for text in record.similarity_texts() {
        seen.extend(normalization.apply(text).chars().filter(|c| query_chars.contains(c)));
    }
    seen.len()
}

fn kind_of(id: &CandidateId) -> IndexKind {
    match id {
        CandidateId::Field(_) => IndexKind::Fields,
        CandidateId::Metric(_) => IndexKind::Metrics,
        CandidateId::DimensionValue(_) => IndexKind::DimensionValues,
    }
}

fn accepts(filters: &SearchFilter, record: &CandidateRecord) -> bool {
    match record {
        CandidateRecord::Field { field } | CandidateRecord::DimensionValue { field, .. } => filters.accepts(
            Some(&field.table_name),
            Some(&field.column_name),
            field.enabled,
        ),
        CandidateRecord::Metric { .. } => filters.accepts(None, None, true),
    }
}

fn suggestion_value(record: &CandidateRecord) -> String {
    match record {
        CandidateRecord::Field { field } => field.column_name.clone(),
        CandidateRecord::Metric { metric } => metric.metric_id.to_string(),
        CandidateRecord::DimensionValue { dimension_value, .. } => dimension_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PatternConfig;
    use crate::models::{DimensionValueRecord, FieldType, MetricRecord};
    use crate::search::config::SearchConfigBuilder;
    use crate::search::{IndexConfig, TantivyBackend};

    fn order_status() -> FieldRecord {
        FieldRecord::new("dwd_order", "order_status", "订单状态", FieldType::Dimension)
            .with_aliases(vec!["状态"])
    }

    fn service(auto_initialize: bool) -> (SearchService, Arc<Catalog>, Arc<IndexLifecycleManager>) {
        service_with(SearchConfig::default(), auto_initialize)
    }

    fn service_with(
        config: SearchConfig,
        auto_initialize: bool,
    ) -> (SearchService, Arc<Catalog>, Arc<IndexLifecycleManager>) {
        let catalog = Arc::new(Catalog::new(PatternConfig::default()));
        catalog
            .merge_fields(
                vec![
                    order_status(),
                    FieldRecord::new("dim_city", "city_name", "城市", FieldType::Dimension).with_entity(true),
                ],
                false,
            )
            .unwrap();
        catalog
            .replace_dimension_values(vec![
                DimensionValueRecord::new(&order_status(), "已完成", 15420),
                DimensionValueRecord::new(&order_status(), "已取消", 310),
            ])
            .unwrap();
        catalog
            .replace_metrics(vec![MetricRecord::new(1, "GMV").with_aliases(vec!["成交额"])], false)
            .unwrap();

        let backend = TantivyBackend::open(IndexConfig::in_memory("t")).unwrap();
        let lifecycle = Arc::new(IndexLifecycleManager::new(Arc::new(backend), "t"));
        let service = SearchService::new(
            config,
            catalog.clone(),
            lifecycle.clone(),
            auto_initialize,
        )
        .unwrap();
        (service, catalog, lifecycle)
    }

    #[tokio::test]
    async fn test_rejects_empty_query_and_bad_size() {
        let (service, _, _) = service(true);
        assert!(matches!(
            service.search(&SearchRequest::new("  ", SearchMethod::Hybrid)).await,
            Err(SearchError::InvalidRequest(_))
        ));
        let oversized = SearchRequest::new("状态", SearchMethod::Hybrid).with_size(1_000);
        assert!(service.search(&oversized).await.is_err());
    }

    #[tokio::test]
    async fn test_pattern_method_needs_no_index() {
        let (service, _, lifecycle) = service(false);
        let response = service
            .search(&SearchRequest::new("订单状态", SearchMethod::Pattern))
            .await
            .unwrap();
        assert_eq!(response.results[0].record.label(), "订单状态");
        assert_eq!(response.results[0].engines, vec![Engine::Pattern]);
        assert_eq!(lifecycle.readiness(IndexKind::Fields), Readiness::Absent);
    }

    #[tokio::test]
    async fn test_auto_initializes_absent_index() {
        let (service, _, lifecycle) = service(true);
        let response = service
            .search(&SearchRequest::new("已完成", SearchMethod::DimensionValues))
            .await
            .unwrap();

        assert_eq!(lifecycle.readiness(IndexKind::DimensionValues), Readiness::Ready);
        let top = &response.results[0];
        assert_eq!(top.record.label(), "已完成");
        assert_eq!(top.record.frequency(), Some(15420));
    }

    #[tokio::test]
    async fn test_dimension_values_sorted_by_frequency_before_size_cut() {
        let (service, catalog, _) = service(true);
        catalog
            .replace_dimension_values(vec![
                DimensionValueRecord::new(&order_status(), "已完成", 10),
                DimensionValueRecord::new(&order_status(), "已完成退款", 9999),
            ])
            .unwrap();

        let mut request = SearchRequest::new("已完成", SearchMethod::DimensionValues)
            .with_tokenize(true)
            .with_size(1);
        request.analyzer = Some(Analyzer::Ngram);
        let top = service.search(&request).await.unwrap();
        assert_eq!(top.results.len(), 1);
        assert_eq!(top.results[0].record.frequency(), Some(9999));
        assert_eq!(top.results[0].engines, vec![Engine::DimensionValues]);

        let all = service.search(&request.clone().with_size(10)).await.unwrap();
        let frequencies: Vec<Option<u64>> = all.results.iter().map(|r| r.record.frequency()).collect();
        assert_eq!(frequencies, vec![Some(9999), Some(10)]);
    }

    #[tokio::test]
    async fn test_similarity_pool_reaches_past_bound() {
        let config = SearchConfigBuilder::new().similarity_max_candidates(1).build();
        let (service, _, _) = service_with(config, false);

        // Fields and metrics come first in catalog order; none shares a char
        let response = service
            .search(&SearchRequest::new("已取销", SearchMethod::Similarity))
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].record.label(), "已取消");
        assert_eq!(response.results[0].engines, vec![Engine::Similarity]);
    }

    #[tokio::test]
    async fn test_hybrid_merges_engines() {
        let (service, _, _) = service(true);
        let response = service
            .search(&SearchRequest::new("成交额", SearchMethod::Hybrid))
            .await
            .unwrap();
        let top = &response.results[0];
        assert_eq!(top.record.id(), CandidateId::Metric(1));
        assert!(top.engines.len() >= 2);
        assert!(response.failed_engines.is_empty());
    }

    #[tokio::test]
    async fn test_extract_entities() {
        let (service, _, _) = service(true);
        let entities = service.extract_entities("上海城市的订单状态");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].column_name, "city_name");
        assert!(entities[0].confidence > 0.0 && entities[0].confidence <= 0.5);
    }
}
