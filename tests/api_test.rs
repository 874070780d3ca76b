//! HTTP surface, driven through the router without a socket

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{in_memory_config, static_service, SlowSource};
use metadata_discovery::api::{build_router, AppState};
use metadata_discovery::search::TantivyBackend;
use metadata_discovery::DiscoveryService;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app(prefix: &str) -> Router {
    build_router(AppState::new(Arc::new(static_service(prefix))))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router answers");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_indices() {
    let app = app("api_health");

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["is_syncing"], false);
    assert_eq!(body["indices"].as_array().unwrap().len(), 3);
    assert!(body["indices"]
        .as_array()
        .unwrap()
        .iter()
        .all(|index| index["readiness"] == "ABSENT"));
}

#[tokio::test]
async fn test_create_then_search() {
    let app = app("api_create_search");

    let (status, body) = send(&app, json_request("POST", "/v1/indices", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["total_requested"], 3);
    assert_eq!(body["sync"]["success"], true);

    // 订单状态
    let (status, body) = send(
        &app,
        get("/v1/search?q=%E8%AE%A2%E5%8D%95%E7%8A%B6%E6%80%81&method=hybrid&size=3"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "hybrid");
    assert_eq!(body["results"][0]["record"]["type"], "field");
    assert_eq!(body["results"][0]["record"]["field"]["column_name"], "order_status");

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/search", json!({"query": "成交额", "method": "metrics"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["record"]["metric"]["name"], "GMV");

    let (status, body) = send(&app, get("/v1/tables")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    let orders = body
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["table_name"] == "dwd_order")
        .unwrap();
    assert_eq!(orders["measure_count"], 1);
}

#[tokio::test]
async fn test_search_validation() {
    let app = app("api_validation");

    let (status, body) = send(&app, get("/v1/search?q=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, get("/v1/search?q=x&method=telepathy")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/v1/search?q=x&size=100000")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_delete_needs_confirmation() {
    let app = app("api_delete");
    send(&app, json_request("POST", "/v1/indices", json!({}))).await;

    let (status, body) = send(&app, json_request("DELETE", "/v1/indices", json!({"metrics": true}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONFIRMATION_REQUIRED");

    let (status, body) = send(
        &app,
        json_request("DELETE", "/v1/indices", json!({"metrics": true, "confirm": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], json!(["metrics"]));
    assert_eq!(
        body["summary"],
        json!({"total_requested": 1, "deleted": 1, "failed": 0, "skipped": 0})
    );
}

#[tokio::test]
async fn test_sync_routes() {
    let app = app("api_sync");

    let (status, body) = send(&app, json_request("POST", "/v1/sync/everything", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, json_request("POST", "/v1/sync/metrics", json!({"force": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["metrics"]["detail"]["metrics_loaded"], 2);
    assert!(body["metadata"].is_null());

    let (status, body) = send(&app, get("/v1/sync/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_syncing"], false);
    assert!(body["last_sync_time"].is_string());
}

#[tokio::test]
async fn test_sync_outlasts_request_timeout() {
    let mut config = in_memory_config("api_long_sync");
    config.server.request_timeout_secs = 1;
    let backend = TantivyBackend::open(config.index.clone()).unwrap();
    let source = Arc::new(SlowSource::new(Duration::from_millis(1500)));
    let service = DiscoveryService::with_components(config, Arc::new(backend), source.clone(), None).unwrap();
    let app = build_router(AppState::new(Arc::new(service)));

    let (status, body) = send(&app, json_request("POST", "/v1/sync/metadata", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["metadata"]["detail"]["fields_loaded"], 4);
    assert_eq!(source.calls(), 1);

    let (status, body) = send(&app, get("/v1/sync/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["last_sync_time"].is_string());
}

#[tokio::test]
async fn test_extract_and_sources_health() {
    let app = app("api_extract");
    send(&app, json_request("POST", "/v1/sync/all", json!({}))).await;

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/extract", json!({"text": "按城市看成交额"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["entities"][0]["column_name"], "city_name");

    let (status, body) = send(&app, get("/v1/sources/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata_source"], "static");
    assert_eq!(body["sources"], json!([]));
}
