//! Index lifecycle against a backend that can be told to fail

mod common;

use common::{in_memory_config, sample_fields, sample_metrics, FlakyBackend};
use metadata_discovery::lifecycle::{CreateOutcome, IndexLifecycleManager, IndexUpdate, LifecycleError};
use metadata_discovery::models::{IndexKind, IndexSelection, IndexState, Readiness, SyncCategory, SyncParams};
use metadata_discovery::search::{FullTextBackend, IndexConfig, IndexDocument, TantivyBackend};
use metadata_discovery::sources::StaticMetadataSource;
use metadata_discovery::{AppError, DiscoveryService};
use serde_json::json;
use std::sync::Arc;

fn field_documents() -> Vec<IndexDocument> {
    sample_fields().iter().map(IndexDocument::from).collect()
}

fn metric_documents() -> Vec<IndexDocument> {
    sample_metrics().iter().map(IndexDocument::from).collect()
}

async fn ready_manager(prefix: &str) -> (Arc<FlakyBackend>, IndexLifecycleManager) {
    let backend = Arc::new(FlakyBackend::new(prefix));
    let manager = IndexLifecycleManager::new(backend.clone(), prefix);
    manager
        .create_or_recreate(IndexKind::Fields, field_documents(), false)
        .await
        .unwrap();
    manager
        .create_or_recreate(IndexKind::DimensionValues, Vec::new(), false)
        .await
        .unwrap();
    manager
        .create_or_recreate(IndexKind::Metrics, metric_documents(), false)
        .await
        .unwrap();
    (backend, manager)
}

#[tokio::test]
async fn test_failed_rebuild_leaves_index_absent() {
    let (backend, manager) = ready_manager("lc_rebuild").await;
    backend.fail(IndexKind::Fields);

    let result = manager
        .create_or_recreate(IndexKind::Fields, field_documents(), true)
        .await;
    assert!(matches!(result, Err(LifecycleError::Backend { index: IndexKind::Fields, .. })));

    let descriptor = manager.descriptor(IndexKind::Fields);
    assert_eq!(descriptor.state, IndexState::Absent);
    assert_eq!(descriptor.generation, None);
    assert_eq!(manager.readiness(IndexKind::Fields), Readiness::Absent);
    // The next search may try again
    assert!(manager.try_claim_initialization(IndexKind::Fields));

    // Other indices are untouched
    assert_eq!(manager.readiness(IndexKind::Metrics), Readiness::Ready);

    backend.heal(IndexKind::Fields);
    let outcome = manager
        .create_or_recreate(IndexKind::Fields, field_documents(), false)
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::Created { document_count: 4, .. }));
}

#[tokio::test]
async fn test_failed_refresh_keeps_serving_previous_generation() {
    let (backend, manager) = ready_manager("lc_refresh").await;
    let before = manager.descriptor(IndexKind::Metrics);
    backend.fail(IndexKind::Metrics);

    let update = IndexUpdate {
        full: Vec::new(),
        changed: metric_documents(),
        removed_ids: vec!["metric:1".to_string()],
    };
    assert!(manager.apply(IndexKind::Metrics, update, false).await.is_err());

    let after = manager.descriptor(IndexKind::Metrics);
    assert_eq!(after.state, IndexState::Ready);
    assert_eq!(after.generation, before.generation);
    assert_eq!(after.document_count, 2);
    assert_eq!(backend.count(IndexKind::Metrics).await.unwrap(), 2);
}

#[tokio::test]
async fn test_refresh_after_failure_rebuilds_from_full_set() {
    let (backend, manager) = ready_manager("lc_diverged").await;
    let before = manager.descriptor(IndexKind::Metrics);
    backend.fail(IndexKind::Metrics);

    let update = IndexUpdate {
        full: metric_documents()[1..].to_vec(),
        changed: Vec::new(),
        removed_ids: vec!["metric:1".to_string()],
    };
    assert!(manager.apply(IndexKind::Metrics, update, false).await.is_err());
    assert!(manager.is_diverged(IndexKind::Metrics));

    // The catalog already dropped metric 1, so the next diff no longer names it
    backend.heal(IndexKind::Metrics);
    let update = IndexUpdate {
        full: metric_documents()[1..].to_vec(),
        changed: Vec::new(),
        removed_ids: Vec::new(),
    };
    let info = manager.apply(IndexKind::Metrics, update, false).await.unwrap();
    assert_ne!(Some(info.generation), before.generation);
    assert_eq!(info.document_count, 1);
    assert!(!manager.is_diverged(IndexKind::Metrics));

    let labels: Vec<String> = backend
        .records(IndexKind::Metrics)
        .await
        .unwrap()
        .iter()
        .map(|r| r.label().to_string())
        .collect();
    assert_eq!(labels, vec!["客单价".to_string()]);
}

#[tokio::test]
async fn test_delete_only_selected_index() {
    let (_backend, manager) = ready_manager("lc_delete_one").await;
    let selection = IndexSelection {
        metrics: true,
        ..Default::default()
    };

    let report = manager.delete_all(selection, true).await.unwrap();
    let body = serde_json::to_value(&report).unwrap();
    assert_eq!(body["deleted"], json!(["metrics"]));
    assert_eq!(
        body["summary"],
        json!({"total_requested": 1, "deleted": 1, "failed": 0, "skipped": 0})
    );
    assert!(report.success);

    assert_eq!(manager.readiness(IndexKind::Metrics), Readiness::Absent);
    assert_eq!(manager.readiness(IndexKind::Fields), Readiness::Ready);
    assert_eq!(manager.readiness(IndexKind::DimensionValues), Readiness::Ready);
}

#[tokio::test]
async fn test_delete_continues_past_failing_index() {
    let (backend, manager) = ready_manager("lc_delete_partial").await;
    backend.fail(IndexKind::DimensionValues);

    let report = manager.delete_all(IndexSelection::all(), true).await.unwrap();
    assert!(!report.success);
    assert_eq!(report.deleted, vec![IndexKind::Fields, IndexKind::Metrics]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].unit, IndexKind::DimensionValues);
    assert_eq!(report.summary.total_requested, 3);
    assert_eq!(report.summary.deleted, 2);
    assert_eq!(report.summary.failed, 1);

    // The failed index keeps its previous state
    assert_eq!(manager.readiness(IndexKind::DimensionValues), Readiness::Ready);
}

#[tokio::test]
async fn test_delete_of_absent_index_is_skipped() {
    let backend = Arc::new(FlakyBackend::new("lc_absent"));
    let manager = IndexLifecycleManager::new(backend, "lc_absent");

    let report = manager.delete_all(IndexSelection::all(), true).await.unwrap();
    assert!(report.success);
    assert!(report.deleted.is_empty());
    assert_eq!(report.skipped.len(), 3);
    assert_eq!(report.summary.skipped, 3);
}

#[tokio::test]
async fn test_service_delete_requires_confirm() {
    let backend = Arc::new(FlakyBackend::new("lc_confirm"));
    let service = DiscoveryService::with_components(
        in_memory_config("lc_confirm"),
        backend,
        Arc::new(StaticMetadataSource::new(sample_fields(), sample_metrics())),
        None,
    )
    .unwrap();
    service.create_indices(false, true).await.unwrap();

    let err = service
        .delete_indices(IndexSelection::all(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConfirmationRequired(_)));
    assert_eq!(err.status_code().as_u16(), 400);

    let err = service
        .delete_indices(IndexSelection::default(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    for kind in IndexKind::all() {
        assert_eq!(service.lifecycle().readiness(kind), Readiness::Ready);
    }
}

#[tokio::test]
async fn test_create_reports_failed_index() {
    let backend = Arc::new(FlakyBackend::new("lc_create_partial"));
    backend.fail(IndexKind::DimensionValues);
    let service = DiscoveryService::with_components(
        in_memory_config("lc_create_partial"),
        backend,
        Arc::new(StaticMetadataSource::new(sample_fields(), sample_metrics())),
        None,
    )
    .unwrap();

    let response = service.create_indices(false, false).await.unwrap();
    assert!(!response.report.success);
    assert_eq!(response.report.created, vec![IndexKind::Fields, IndexKind::Metrics]);
    assert_eq!(response.report.failed.len(), 1);
    assert_eq!(response.report.failed[0].unit, IndexKind::DimensionValues);
}

#[tokio::test]
async fn test_restart_recovers_indices_and_catalog() {
    let backend = Arc::new(TantivyBackend::open(IndexConfig::in_memory("lc_restart")).unwrap());
    let source = Arc::new(StaticMetadataSource::new(sample_fields(), sample_metrics()));

    let first = DiscoveryService::with_components(
        in_memory_config("lc_restart"),
        backend.clone(),
        source.clone(),
        None,
    )
    .unwrap();
    first.sync(SyncCategory::All, SyncParams::default()).await.unwrap();

    // A fresh process around the same storage, with an empty upstream
    let second = DiscoveryService::with_components(
        in_memory_config("lc_restart"),
        backend,
        Arc::new(StaticMetadataSource::new(Vec::new(), Vec::new())),
        None,
    )
    .unwrap();
    assert_eq!(second.stats().catalog.fields, 0);

    let recovered = second.start().await.unwrap();
    assert_eq!(recovered.len(), 3);
    assert_eq!(second.stats().catalog.fields, sample_fields().len());
    assert_eq!(second.stats().catalog.metrics, sample_metrics().len());
    assert!(!second.catalog().pattern_matches("成交额").is_empty());
}
