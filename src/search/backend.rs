//! Full-text backend boundary

use crate::models::{CandidateRecord, IndexKind};
use crate::search::document::IndexDocument;
use crate::search::error::SearchResult;
use crate::search::query::FullTextQuery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One relevance hit from a full-text index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullTextHit {
    pub doc_id: String,
    pub score: f64,
    /// Highlighted fragment, if the query touched a stored text attribute
    pub snippet: Option<String>,
    pub record: CandidateRecord,
}

/// What a build or refresh left visible to readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub generation: u64,
    pub document_count: u64,
    pub built_at: DateTime<Utc>,
}

/// Storage operations the lifecycle manager and search service rely on.
///
/// Index names are `{prefix}_{kind}`. Implementations must make every
/// mutation visible all at once: a reader sees either the documents before
/// a call or the documents after it.
#[async_trait]
pub trait FullTextBackend: Send + Sync {
    fn index_name(&self, kind: IndexKind) -> String;

    async fn exists(&self, kind: IndexKind) -> SearchResult<bool>;

    /// The generation readers currently see, if any.
    async fn current(&self, kind: IndexKind) -> SearchResult<Option<GenerationInfo>>;

    /// Create an empty index. Returns `false` without touching anything when
    /// the index exists and `force_recreate` is not set.
    async fn create(&self, kind: IndexKind, force_recreate: bool) -> SearchResult<bool>;

    /// Build a new generation holding exactly `documents`, then swap it in.
    async fn replace_all(
        &self,
        kind: IndexKind,
        documents: Vec<IndexDocument>,
    ) -> SearchResult<GenerationInfo>;

    /// Upsert by document id and drop `removed_ids`, committed together.
    async fn upsert(
        &self,
        kind: IndexKind,
        documents: Vec<IndexDocument>,
        removed_ids: Vec<String>,
    ) -> SearchResult<GenerationInfo>;

    /// Remove the physical index. Returns `false` when nothing existed.
    async fn delete(&self, kind: IndexKind) -> SearchResult<bool>;

    async fn count(&self, kind: IndexKind) -> SearchResult<u64>;

    async fn search(&self, kind: IndexKind, query: &FullTextQuery) -> SearchResult<Vec<FullTextHit>>;

    /// Every stored record, used to restore the catalog after a restart.
    async fn records(&self, kind: IndexKind) -> SearchResult<Vec<CandidateRecord>>;
}
