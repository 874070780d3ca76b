use crate::api::AppState;
use crate::catalog::TableSummary;
use crate::error::{AppError, Result};
use crate::lifecycle::DeleteReport;
use crate::models::{IndexSelection, SyncCategory, SyncParams, SyncStatus};
use crate::search::{
    Analyzer, ExtractedEntity, SearchFilter, SearchMethod, SearchRequest, SearchResponse,
    Suggestion,
};
use crate::service::{CreateIndicesResponse, IndexHealth, ServiceStats, SourcesHealth};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let health = state.service.health();
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        indices: health.indices,
        is_syncing: health.is_syncing,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub indices: Vec<IndexHealth>,
    pub is_syncing: bool,
}

/// `GET /v1/search?q=...`
pub async fn search_get(
    State(state): State<AppState>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<SearchResponse>> {
    params.validate()?;
    let response = state.service.search(&params.into()).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQueryParams {
    #[validate(length(min = 1, max = 500))]
    pub q: String,
    #[serde(default)]
    pub method: SearchMethod,
    pub tokenize: Option<bool>,
    pub analyzer: Option<Analyzer>,
    #[validate(range(min = 1))]
    pub size: Option<usize>,
    /// Restrict to one table
    pub table: Option<String>,
    pub column: Option<String>,
    #[serde(default)]
    pub include_disabled: bool,
}

impl From<SearchQueryParams> for SearchRequest {
    fn from(params: SearchQueryParams) -> Self {
        SearchRequest {
            query: params.q,
            method: params.method,
            filters: SearchFilter {
                table_names: params.table.map(|table| vec![table]),
                column_name: params.column,
                enabled_only: !params.include_disabled,
            },
            tokenize: params.tokenize,
            analyzer: params.analyzer,
            size: params.size,
        }
    }
}

/// `POST /v1/search`
pub async fn search_post(
    State(state): State<AppState>,
    Json(request): Json<SearchBody>,
) -> Result<Json<SearchResponse>> {
    request.validate()?;
    let response = state.service.search(&request.into()).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchBody {
    #[validate(length(min = 1, max = 500))]
    pub query: String,
    #[serde(default)]
    pub method: SearchMethod,
    #[serde(default)]
    pub filters: SearchFilter,
    pub tokenize: Option<bool>,
    pub analyzer: Option<Analyzer>,
    #[validate(range(min = 1))]
    pub size: Option<usize>,
}

impl From<SearchBody> for SearchRequest {
    fn from(body: SearchBody) -> Self {
        SearchRequest {
            query: body.query,
            method: body.method,
            filters: body.filters,
            tokenize: body.tokenize,
            analyzer: body.analyzer,
            size: body.size,
        }
    }
}

pub async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<Vec<Suggestion>>> {
    params.validate()?;
    let suggestions = state.service.suggest(&params.q, params.size).await?;
    Ok(Json(suggestions))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SuggestParams {
    #[validate(length(min = 1, max = 100))]
    pub q: String,
    #[validate(range(min = 1))]
    pub size: Option<usize>,
}

pub async fn extract_entities(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>> {
    request.validate()?;
    let entities = state.service.extract(&request.text);
    Ok(Json(ExtractResponse {
        total: entities.len(),
        entities,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtractRequest {
    #[validate(length(min = 1, max = 10000))]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub total: usize,
    pub entities: Vec<ExtractedEntity>,
}

pub async fn list_tables(State(state): State<AppState>) -> Json<Vec<TableSummary>> {
    Json(state.service.tables())
}

pub async fn stats(State(state): State<AppState>) -> Json<ServiceStats> {
    Json(state.service.stats())
}

/// Create indices; 207 when some index failed
pub async fn create_indices(
    State(state): State<AppState>,
    body: Option<Json<CreateIndicesRequest>>,
) -> Result<(StatusCode, Json<CreateIndicesResponse>)> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let response = state
        .service
        .create_indices(request.force_recreate, request.auto_load_data)
        .await?;
    let status = if response.report.success {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct CreateIndicesRequest {
    #[serde(default)]
    pub force_recreate: bool,
    #[serde(default = "default_true")]
    pub auto_load_data: bool,
}

impl Default for CreateIndicesRequest {
    fn default() -> Self {
        Self {
            force_recreate: false,
            auto_load_data: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Delete indices; requires `confirm: true` and a non-empty selection
pub async fn delete_indices(
    State(state): State<AppState>,
    Json(request): Json<DeleteIndicesRequest>,
) -> Result<(StatusCode, Json<DeleteReport>)> {
    let selection = IndexSelection {
        fields: request.fields,
        dimension_values: request.dimension_values,
        metrics: request.metrics,
    };
    let report = state.service.delete_indices(selection, request.confirm).await?;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(report)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteIndicesRequest {
    #[serde(default)]
    pub fields: bool,
    #[serde(default)]
    pub dimension_values: bool,
    #[serde(default)]
    pub metrics: bool,
    #[serde(default)]
    pub confirm: bool,
}

/// `POST /v1/sync/:category`; 409 while another sync runs
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(category): Path<String>,
    body: Option<Json<SyncParams>>,
) -> Result<Json<SyncStatus>> {
    let category: SyncCategory = category
        .parse()
        .map_err(|_| AppError::Validation(format!("unknown sync category '{}'", category)))?;
    let params = body.map(|Json(params)| params).unwrap_or_default();

    let status = state.service.sync(category, params).await?;
    Ok(Json(status))
}

pub async fn sync_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.service.sync_status())
}

pub async fn sources_health(State(state): State<AppState>) -> Json<SourcesHealth> {
    Json(state.service.sources_health().await)
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::gather_metrics(),
    )
}
