//! Per-index state machine: ABSENT -> CREATING -> READY -> DELETING -> ABSENT

use super::error::{LifecycleError, LifecycleResult};
use crate::metrics;
use crate::models::{IndexDescriptor, IndexKind, IndexSelection, IndexState, Readiness};
use crate::outcome::{BulkOutcome, BulkSummary, UnitFailure, UnitSkip};
use crate::search::{FullTextBackend, GenerationInfo, IndexDocument};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created { generation: u64, document_count: u64 },
    /// READY and not forced; nothing was touched
    AlreadyReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing existed under the index name
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub total_requested: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl From<BulkSummary> for DeleteSummary {
    fn from(summary: BulkSummary) -> Self {
        Self {
            total_requested: summary.total_requested,
            deleted: summary.succeeded,
            failed: summary.failed,
            skipped: summary.skipped,
        }
    }
}

/// Documents for one refresh: the complete set for a rebuild, and the
/// delta for an incremental update.
#[derive(Debug, Clone, Default)]
pub struct IndexUpdate {
    pub full: Vec<IndexDocument>,
    pub changed: Vec<IndexDocument>,
    pub removed_ids: Vec<String>,
}

/// Per-index result of a bulk delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub success: bool,
    pub deleted: Vec<IndexKind>,
    pub failed: Vec<UnitFailure<IndexKind>>,
    pub skipped: Vec<UnitSkip<IndexKind>>,
    pub summary: DeleteSummary,
}

impl From<BulkOutcome<IndexKind>> for DeleteReport {
    fn from(outcome: BulkOutcome<IndexKind>) -> Self {
        Self {
            success: outcome.success(),
            summary: outcome.summary().into(),
            deleted: outcome.succeeded,
            failed: outcome.failed,
            skipped: outcome.skipped,
        }
    }
}

/// Per-index result of a bulk create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReport {
    pub success: bool,
    pub created: Vec<IndexKind>,
    pub failed: Vec<UnitFailure<IndexKind>>,
    /// Already READY and not forced
    pub skipped: Vec<UnitSkip<IndexKind>>,
    pub summary: BulkSummary,
}

impl From<BulkOutcome<IndexKind>> for CreateReport {
    fn from(outcome: BulkOutcome<IndexKind>) -> Self {
        Self {
            success: outcome.success(),
            summary: outcome.summary(),
            created: outcome.succeeded,
            failed: outcome.failed,
            skipped: outcome.skipped,
        }
    }
}

/// Owns the state of the three indices.
///
/// Search paths only ever ask for [`Readiness`]; CREATING and DELETING are
/// internal. Mutations of one index are serialized, different indices move
/// independently.
pub struct IndexLifecycleManager {
    backend: Arc<dyn FullTextBackend>,
    prefix: String,
    descriptors: RwLock<HashMap<IndexKind, IndexDescriptor>>,
    locks: HashMap<IndexKind, tokio::sync::Mutex<()>>,
    /// Cleared on delete or failed build so the next search re-initializes
    initialized: HashMap<IndexKind, AtomicBool>,
    /// Set when an incremental refresh failed; the index may lack removals
    /// the catalog has already applied, so only a rebuild can reconcile it
    diverged: HashMap<IndexKind, AtomicBool>,
}

impl IndexLifecycleManager {
    pub fn new(backend: Arc<dyn FullTextBackend>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let kinds = IndexKind::all();
        Self {
            descriptors: RwLock::new(
                kinds
                    .iter()
                    .map(|kind| (*kind, IndexDescriptor::absent(*kind, &prefix)))
                    .collect(),
            ),
            locks: kinds.iter().map(|kind| (*kind, tokio::sync::Mutex::new(()))).collect(),
            initialized: kinds.iter().map(|kind| (*kind, AtomicBool::new(false))).collect(),
            diverged: kinds.iter().map(|kind| (*kind, AtomicBool::new(false))).collect(),
            backend,
            prefix,
        }
    }

    pub fn backend(&self) -> &Arc<dyn FullTextBackend> {
        &self.backend
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn descriptor(&self, kind: IndexKind) -> IndexDescriptor {
        self.descriptors
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| IndexDescriptor::absent(kind, &self.prefix))
    }

    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        IndexKind::all().into_iter().map(|kind| self.descriptor(kind)).collect()
    }

    /// A rebuild in progress still serves its previous generation.
    pub fn readiness(&self, kind: IndexKind) -> Readiness {
        let descriptor = self.descriptor(kind);
        match descriptor.state {
            IndexState::Ready => Readiness::Ready,
            IndexState::Creating if descriptor.generation.is_some() => Readiness::Ready,
            _ => Readiness::Absent,
        }
    }

    /// Claim the right to initialize an ABSENT index. Only one caller wins
    /// until the flag is cleared again.
    pub fn try_claim_initialization(&self, kind: IndexKind) -> bool {
        self.initialized
            .get(&kind)
            .map(|flag| {
                flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    fn set_initialized(&self, kind: IndexKind, value: bool) {
        if let Some(flag) = self.initialized.get(&kind) {
            flag.store(value, Ordering::Release);
        }
    }

    pub fn is_diverged(&self, kind: IndexKind) -> bool {
        self.diverged
            .get(&kind)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    fn set_diverged(&self, kind: IndexKind, value: bool) {
        if let Some(flag) = self.diverged.get(&kind) {
            flag.store(value, Ordering::Release);
        }
    }

    fn set_descriptor(&self, descriptor: IndexDescriptor) {
        self.descriptors.write().insert(descriptor.kind, descriptor);
    }

    fn set_state(&self, kind: IndexKind, state: IndexState) {
        if let Some(descriptor) = self.descriptors.write().get_mut(&kind) {
            descriptor.state = state;
        }
    }

    fn mark_ready(&self, kind: IndexKind, info: GenerationInfo) {
        self.set_descriptor(IndexDescriptor {
            kind,
            name: kind.index_name(&self.prefix),
            state: IndexState::Ready,
            document_count: info.document_count,
            last_build: Some(info.built_at),
            generation: Some(info.generation),
        });
        self.set_initialized(kind, true);
        metrics::record_index_documents(&kind.index_name(&self.prefix), info.document_count);
    }

    fn mark_rebuilt(&self, kind: IndexKind, info: GenerationInfo) {
        self.mark_ready(kind, info);
        self.set_diverged(kind, false);
    }

    fn mark_absent(&self, kind: IndexKind) {
        self.set_descriptor(IndexDescriptor::absent(kind, &self.prefix));
        self.set_initialized(kind, false);
        metrics::record_index_documents(&kind.index_name(&self.prefix), 0);
    }

    async fn lock(&self, kind: IndexKind) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.locks.get(&kind) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    /// Mark READY every index the backend already holds.
    pub async fn recover(&self) -> LifecycleResult<Vec<IndexKind>> {
        let mut recovered = Vec::new();
        for kind in IndexKind::all() {
            let _guard = self.lock(kind).await;
            match self
                .backend
                .current(kind)
                .await
                .map_err(|e| LifecycleError::backend(kind, e))?
            {
                Some(info) => {
                    info!(
                        index = %kind.index_name(&self.prefix),
                        generation = info.generation,
                        documents = info.document_count,
                        "Recovered existing index"
                    );
                    self.mark_ready(kind, info);
                    recovered.push(kind);
                }
                None => self.mark_absent(kind),
            }
        }
        Ok(recovered)
    }

    /// Build `kind` from `documents` unless it is READY and `force` is off.
    ///
    /// The new generation replaces the old one only once it is complete. Any
    /// failure leaves the index ABSENT.
    pub async fn create_or_recreate(
        &self,
        kind: IndexKind,
        documents: Vec<IndexDocument>,
        force: bool,
    ) -> LifecycleResult<CreateOutcome> {
        let _guard = self.lock(kind).await;

        if self.descriptor(kind).state == IndexState::Ready && !force {
            debug!(index = %kind, "Index ready, create skipped");
            return Ok(CreateOutcome::AlreadyReady);
        }

        let info = self.rebuild(kind, documents).await?;
        Ok(CreateOutcome::Created {
            generation: info.generation,
            document_count: info.document_count,
        })
    }

    /// Push a refreshed record set into `kind`.
    ///
    /// A READY index gets `update.changed` upserted and `update.removed_ids`
    /// dropped in one commit unless `force` is set. Anything else is a full
    /// rebuild from `update.full` and a swap.
    pub async fn apply(&self, kind: IndexKind, update: IndexUpdate, force: bool) -> LifecycleResult<GenerationInfo> {
        let _guard = self.lock(kind).await;

        if force || self.descriptor(kind).state != IndexState::Ready || self.is_diverged(kind) {
            return self.rebuild(kind, update.full).await;
        }

        let upserted = update.changed.len();
        let removed = update.removed_ids.len();
        let info = self
            .backend
            .upsert(kind, update.changed, update.removed_ids)
            .await
            .map_err(|e| {
                // The backend rolled back; the previous content is still served
                warn!(index = %kind, error = %e, "Incremental refresh failed, next refresh rebuilds");
                self.set_diverged(kind, true);
                LifecycleError::backend(kind, e)
            })?;

        info!(
            index = %kind.index_name(&self.prefix),
            upserted = upserted,
            removed = removed,
            documents = info.document_count,
            "Index refreshed"
        );
        self.mark_ready(kind, info);
        Ok(info)
    }

    /// Caller holds the per-index lock.
    async fn rebuild(&self, kind: IndexKind, documents: Vec<IndexDocument>) -> LifecycleResult<GenerationInfo> {
        let name = kind.index_name(&self.prefix);
        self.set_state(kind, IndexState::Creating);
        info!(index = %name, documents = documents.len(), "Building index generation");

        let started = Utc::now();
        match self.backend.replace_all(kind, documents).await {
            Ok(info) => {
                info!(
                    index = %name,
                    generation = info.generation,
                    documents = info.document_count,
                    duration_ms = (Utc::now() - started).num_milliseconds(),
                    "Index ready"
                );
                self.mark_rebuilt(kind, info);
                Ok(info)
            }
            Err(e) => {
                error!(index = %name, error = %e, "Index build failed, marking absent");
                self.mark_absent(kind);
                Err(LifecycleError::backend(kind, e))
            }
        }
    }

    /// Remove one index. Requires `confirm`.
    pub async fn delete(&self, kind: IndexKind, confirm: bool) -> LifecycleResult<DeleteOutcome> {
        if !confirm {
            return Err(LifecycleError::ConfirmationRequired);
        }
        let _guard = self.lock(kind).await;

        let previous = self.descriptor(kind);
        self.set_state(kind, IndexState::Deleting);

        match self.backend.delete(kind).await {
            Ok(true) => {
                self.mark_absent(kind);
                info!(index = %previous.name, "Index deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Ok(false) => {
                self.mark_absent(kind);
                debug!(index = %previous.name, "Index absent, delete skipped");
                Ok(DeleteOutcome::Skipped)
            }
            Err(e) => {
                warn!(index = %previous.name, error = %e, "Index delete failed");
                self.set_descriptor(previous);
                Err(LifecycleError::backend(kind, e))
            }
        }
    }

    /// Delete every selected index independently.
    ///
    /// The request is validated before any index is touched.
    pub async fn delete_all(&self, selection: IndexSelection, confirm: bool) -> LifecycleResult<DeleteReport> {
        if !confirm {
            return Err(LifecycleError::ConfirmationRequired);
        }
        if selection.is_empty() {
            return Err(LifecycleError::EmptySelection);
        }

        let mut outcome = BulkOutcome::new();
        for kind in selection.kinds() {
            match self.delete(kind, true).await {
                Ok(DeleteOutcome::Deleted) => outcome.succeed(kind),
                Ok(DeleteOutcome::Skipped) => outcome.skip(kind, "index does not exist"),
                Err(e) => outcome.fail(kind, e),
            }
        }

        let report = DeleteReport::from(outcome);
        info!(
            deleted = report.summary.deleted,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "Bulk index delete finished"
        );
        Ok(report)
    }
}
