/// Prometheus metrics for the discovery service.
///
/// Collectors live in a dedicated registry and are exposed in text format
/// through `GET /metrics`:
/// - search requests and latency per method
/// - engine failures during hybrid search
/// - sync runs per category and outcome, plus rejected triggers
/// - documents per index and extracted columns per outcome
///
/// # Example
/// ```no_run
/// use metadata_discovery::metrics::SEARCH_REQUESTS_TOTAL;
///
/// SEARCH_REQUESTS_TOTAL.with_label_values(&["hybrid"]).inc();
/// ```

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};
use std::time::Duration;

const NAMESPACE: &str = "metadata_discovery";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Labels: method
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace(NAMESPACE),
        &["method"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// Labels: method
    pub static ref SEARCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("search_duration_seconds", "Search latency in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method"]
    ).expect("Failed to create SEARCH_DURATION_SECONDS metric");

    /// Engines that errored or timed out during a search. Labels: engine
    pub static ref SEARCH_ENGINE_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_engine_failures_total", "Engine failures during search")
            .namespace(NAMESPACE),
        &["engine"]
    ).expect("Failed to create SEARCH_ENGINE_FAILURES_TOTAL metric");

    /// Labels: category, outcome
    pub static ref SYNC_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("sync_runs_total", "Sync category runs by outcome")
            .namespace(NAMESPACE),
        &["category", "outcome"]
    ).expect("Failed to create SYNC_RUNS_TOTAL metric");

    /// Triggers refused because a sync was already running
    pub static ref SYNC_REJECTED_TOTAL: Counter = Counter::with_opts(
        Opts::new("sync_rejected_total", "Sync triggers rejected while another sync ran")
            .namespace(NAMESPACE)
    ).expect("Failed to create SYNC_REJECTED_TOTAL metric");

    /// Labels: index
    pub static ref INDEX_DOCUMENTS: GaugeVec = GaugeVec::new(
        Opts::new("index_documents", "Documents visible in each index")
            .namespace(NAMESPACE),
        &["index"]
    ).expect("Failed to create INDEX_DOCUMENTS metric");

    /// Labels: outcome (succeeded, failed, skipped)
    pub static ref EXTRACTION_COLUMNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("extraction_columns_total", "Dimension columns processed by outcome")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create EXTRACTION_COLUMNS_TOTAL metric");
}

/// Register every collector with [`PROMETHEUS_REGISTRY`]. Call once at startup.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_ENGINE_FAILURES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SYNC_RUNS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SYNC_REJECTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INDEX_DOCUMENTS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(EXTRACTION_COLUMNS_TOTAL.clone()))?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

pub fn record_search(method: &str, elapsed: Duration) {
    SEARCH_REQUESTS_TOTAL.with_label_values(&[method]).inc();
    SEARCH_DURATION_SECONDS
        .with_label_values(&[method])
        .observe(elapsed.as_secs_f64());
}

pub fn record_engine_failure(engine: &str) {
    SEARCH_ENGINE_FAILURES_TOTAL.with_label_values(&[engine]).inc();
}

pub fn record_sync_run(category: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    SYNC_RUNS_TOTAL.with_label_values(&[category, outcome]).inc();
}

pub fn record_index_documents(index: &str, count: u64) {
    INDEX_DOCUMENTS.with_label_values(&[index]).set(count as f64);
}

pub fn record_extraction(succeeded: usize, failed: usize, skipped: usize) {
    for (outcome, count) in [("succeeded", succeeded), ("failed", failed), ("skipped", skipped)] {
        EXTRACTION_COLUMNS_TOTAL
            .with_label_values(&[outcome])
            .inc_by(count as f64);
    }
}

/// Render the registry in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
