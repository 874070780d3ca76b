use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
///
/// Index creation and sync run as long as the work takes; every other route
/// answers 408 after `server.request_timeout_secs`.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.service.config().server.request_timeout_secs.max(1));
    let prometheus_enabled = state.service.config().observability.prometheus_enabled;

    let mut bounded = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Search
        .route("/v1/search", get(handlers::search_get).post(handlers::search_post))
        .route("/v1/suggest", get(handlers::suggest))
        .route("/v1/extract", post(handlers::extract_entities))
        // Catalog
        .route("/v1/tables", get(handlers::list_tables))
        .route("/v1/stats", get(handlers::stats))
        .route("/v1/sync/status", get(handlers::sync_status))
        .route("/v1/sources/health", get(handlers::sources_health));

    if prometheus_enabled {
        bounded = bounded.route("/metrics", get(handlers::metrics));
    }

    // Cancelling these mid-run would leave categories half applied
    let long_running = Router::new()
        .route(
            "/v1/indices",
            post(handlers::create_indices).delete(handlers::delete_indices),
        )
        .route("/v1/sync/:category", post(handlers::trigger_sync));

    bounded
        .route_layer(TimeoutLayer::new(timeout))
        .merge(long_running)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
