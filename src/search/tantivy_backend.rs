//! Tantivy implementation of the full-text backend
//!
//! Each index kind owns a slot holding the active generation behind an
//! `ArcSwapOption`. A rebuild writes `gen-N` next to the live one, points
//! `CURRENT` at it and swaps the slot; searches that already loaded the old
//! generation finish against it.
//!
//! ```text
//! {root_path}/
//!   kman_fields/
//!     CURRENT          "3"
//!     gen-3/           meta.json, segments
//!   kman_metrics/
//!   kman_dimension_values/
//! ```

use crate::models::{CandidateRecord, IndexKind};
use crate::search::backend::{FullTextBackend, FullTextHit, GenerationInfo};
use crate::search::config::IndexConfig;
use crate::search::document::{build_schema, register_tokenizers, IndexDocument, TextAttr, DOC_ID, FREQUENCY, PAYLOAD};
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::{FullTextQuery, QueryBuilder};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::AllQuery;
use tantivy::schema::{Schema, Value};
use tantivy::snippet::SnippetGenerator;
use tantivy::{
    DocAddress, DocId, Index, IndexReader, IndexWriter, ReloadPolicy, Score, SegmentReader, TantivyDocument,
    Term,
};
use tracing::{debug, info, warn};

const CURRENT_FILE: &str = "CURRENT";

/// One fully built, queryable copy of an index
struct Generation {
    id: u64,
    index: Index,
    schema: Schema,
    reader: IndexReader,
    writer: parking_lot::Mutex<IndexWriter>,
    built_at: DateTime<Utc>,
}

impl Generation {
    fn info(&self) -> GenerationInfo {
        GenerationInfo {
            generation: self.id,
            document_count: self.reader.searcher().num_docs(),
            built_at: self.built_at,
        }
    }
}

struct Slot {
    name: String,
    active: ArcSwapOption<Generation>,
    /// Serializes writers; readers never take it
    write_lock: tokio::sync::Mutex<()>,
    next_generation: AtomicU64,
}

/// Generation-swapping Tantivy backend
pub struct TantivyBackend {
    config: IndexConfig,
    slots: HashMap<IndexKind, Slot>,
    snippet_max_chars: usize,
}

impl TantivyBackend {
    /// Open the backend, reattaching any generation left on disk.
    pub fn open(config: IndexConfig) -> SearchResult<Self> {
        if !config.in_memory {
            std::fs::create_dir_all(&config.root_path).map_err(|e| {
                SearchError::IndexInitFailed(format!("Failed to create index directory: {}", e))
            })?;
        }

        let mut slots = HashMap::new();
        for kind in IndexKind::all() {
            let name = kind.index_name(&config.prefix);
            let slot = Slot {
                name: name.clone(),
                active: ArcSwapOption::empty(),
                write_lock: tokio::sync::Mutex::new(()),
                next_generation: AtomicU64::new(1),
            };

            if !config.in_memory {
                if let Some(id) = read_current(&config.root_path.join(&name)) {
                    let dir = generation_dir(&config.root_path, &name, id);
                    match Self::open_generation(&config, id, &dir) {
                        Ok(generation) => {
                            info!(
                                index = %name,
                                generation = id,
                                documents = generation.reader.searcher().num_docs(),
                                "Reattached index generation"
                            );
                            slot.active.store(Some(Arc::new(generation)));
                        }
                        Err(e) => warn!(index = %name, generation = id, error = %e, "Ignoring unreadable generation"),
                    }
                    slot.next_generation.store(id + 1, Ordering::SeqCst);
                }
            }

            slots.insert(kind, slot);
        }

        Ok(Self {
            config,
            slots,
            snippet_max_chars: 120,
        })
    }

    pub fn with_snippet_chars(mut self, max_chars: usize) -> Self {
        self.snippet_max_chars = max_chars;
        self
    }

    fn slot(&self, kind: IndexKind) -> SearchResult<&Slot> {
        self.slots
            .get(&kind)
            .ok_or_else(|| SearchError::IndexNotFound(kind.index_name(&self.config.prefix)))
    }

    fn active(&self, kind: IndexKind) -> SearchResult<Arc<Generation>> {
        let slot = self.slot(kind)?;
        slot.active
            .load_full()
            .ok_or_else(|| SearchError::IndexNotFound(slot.name.clone()))
    }

    fn writer_for(config: &IndexConfig, index: &Index) -> SearchResult<IndexWriter> {
        let threads = config.indexing_threads.max(1);
        index
            .writer_with_num_threads(threads, config.writer_heap_size)
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create writer: {}", e)))
    }

    fn finish_generation(config: &IndexConfig, id: u64, index: Index, built_at: DateTime<Utc>) -> SearchResult<Generation> {
        register_tokenizers(&index)?;
        let writer = Self::writer_for(config, &index)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create reader: {}", e)))?;

        Ok(Generation {
            id,
            schema: index.schema(),
            index,
            reader,
            writer: parking_lot::Mutex::new(writer),
            built_at,
        })
    }

    fn open_generation(config: &IndexConfig, id: u64, dir: &Path) -> SearchResult<Generation> {
        let index = Index::open_in_dir(dir)
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to open existing index: {}", e)))?;
        let built_at = std::fs::metadata(dir.join("meta.json"))
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Self::finish_generation(config, id, index, built_at)
    }

    /// Build a generation off to the side. Nothing is visible until `swap`.
    fn build_generation(&self, slot: &Slot, documents: &[IndexDocument]) -> SearchResult<Generation> {
        let id = slot.next_generation.fetch_add(1, Ordering::SeqCst);
        let schema = build_schema();

        let index = if self.config.in_memory {
            Index::create_in_ram(schema.clone())
        } else {
            let dir = generation_dir(&self.config.root_path, &slot.name, id);
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
            std::fs::create_dir_all(&dir)?;
            Index::create_in_dir(&dir, schema.clone()).map_err(|e| {
                SearchError::IndexInitFailed(format!("Failed to create new index: {}", e))
            })?
        };

        let generation = Self::finish_generation(&self.config, id, index, Utc::now())?;
        let docs = documents
            .iter()
            .map(|document| document.to_tantivy_doc(&schema))
            .collect::<SearchResult<Vec<_>>>()?;
        apply_staged(&mut *generation.writer.lock(), Vec::new(), docs)?;
        generation.reader.reload()?;

        Ok(generation)
    }

    /// Publish `generation` and drop whatever it replaced.
    fn swap(&self, slot: &Slot, generation: Generation) -> SearchResult<GenerationInfo> {
        let id = generation.id;
        let info = generation.info();

        if !self.config.in_memory {
            write_current(&self.config.root_path.join(&slot.name), id)?;
        }
        let previous = slot.active.swap(Some(Arc::new(generation)));

        if let (Some(previous), false) = (previous, self.config.in_memory) {
            let stale = generation_dir(&self.config.root_path, &slot.name, previous.id);
            if let Err(e) = std::fs::remove_dir_all(&stale) {
                warn!(index = %slot.name, generation = previous.id, error = %e, "Failed to remove stale generation");
            }
        }

        info!(index = %slot.name, generation = id, documents = info.document_count, "Swapped in index generation");
        Ok(info)
    }

    fn payload(schema: &Schema, doc: &TantivyDocument) -> SearchResult<CandidateRecord> {
        let field = schema
            .get_field(PAYLOAD)
            .map_err(|e| SearchError::SearchFailed(format!("missing payload field: {}", e)))?;
        let raw = doc
            .get_first(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| SearchError::SearchFailed("document has no payload".to_string()))?;
        serde_json::from_str(raw)
            .map_err(|e| SearchError::SearchFailed(format!("corrupt payload: {}", e)))
    }

    fn snippet_attr(kind: IndexKind) -> TextAttr {
        match kind {
            IndexKind::DimensionValues => TextAttr::Value,
            IndexKind::Fields | IndexKind::Metrics => TextAttr::Name,
        }
    }
}

#[async_trait]
impl FullTextBackend for TantivyBackend {
    fn index_name(&self, kind: IndexKind) -> String {
        kind.index_name(&self.config.prefix)
    }

    async fn exists(&self, kind: IndexKind) -> SearchResult<bool> {
        Ok(self.slot(kind)?.active.load().is_some())
    }

    async fn current(&self, kind: IndexKind) -> SearchResult<Option<GenerationInfo>> {
        Ok(self.slot(kind)?.active.load_full().map(|generation| generation.info()))
    }

    async fn create(&self, kind: IndexKind, force_recreate: bool) -> SearchResult<bool> {
        let slot = self.slot(kind)?;
        let _guard = slot.write_lock.lock().await;

        if slot.active.load().is_some() && !force_recreate {
            debug!(index = %slot.name, "Index exists, create skipped");
            return Ok(false);
        }

        let generation = self.build_generation(slot, &[])?;
        self.swap(slot, generation)?;
        Ok(true)
    }

    async fn replace_all(
        &self,
        kind: IndexKind,
        documents: Vec<IndexDocument>,
    ) -> SearchResult<GenerationInfo> {
        let slot = self.slot(kind)?;
        let _guard = slot.write_lock.lock().await;

        let generation = match self.build_generation(slot, &documents) {
            Ok(generation) => generation,
            Err(e) => {
                if !self.config.in_memory {
                    let id = slot.next_generation.load(Ordering::SeqCst).saturating_sub(1);
                    let _ = std::fs::remove_dir_all(generation_dir(&self.config.root_path, &slot.name, id));
                }
                return Err(e);
            }
        };
        self.swap(slot, generation)
    }

    async fn upsert(
        &self,
        kind: IndexKind,
        documents: Vec<IndexDocument>,
        removed_ids: Vec<String>,
    ) -> SearchResult<GenerationInfo> {
        let slot = self.slot(kind)?;
        let _guard = slot.write_lock.lock().await;
        let generation = self.active(kind)?;

        let id_field = generation
            .schema
            .get_field(DOC_ID)
            .map_err(|e| SearchError::IndexingFailed(format!("missing id field: {}", e)))?;

        // Convert first so a bad document fails before anything is queued
        let docs = documents
            .iter()
            .map(|document| document.to_tantivy_doc(&generation.schema))
            .collect::<SearchResult<Vec<_>>>()?;
        let deletes = removed_ids
            .iter()
            .chain(documents.iter().map(|d| &d.doc_id))
            .map(|doc_id| Term::from_field_text(id_field, doc_id))
            .collect();
        apply_staged(&mut *generation.writer.lock(), deletes, docs)?;
        generation.reader.reload()?;

        debug!(
            index = %slot.name,
            upserted = documents.len(),
            removed = removed_ids.len(),
            "Applied incremental refresh"
        );
        Ok(generation.info())
    }

    async fn delete(&self, kind: IndexKind) -> SearchResult<bool> {
        let slot = self.slot(kind)?;
        let _guard = slot.write_lock.lock().await;

        let previous = slot.active.swap(None);
        if self.config.in_memory {
            return Ok(previous.is_some());
        }

        let dir = self.config.root_path.join(&slot.name);
        if !dir.exists() {
            return Ok(previous.is_some());
        }
        std::fs::remove_dir_all(&dir).map_err(|e| {
            if let Some(previous) = previous {
                // The files are still there, keep serving them
                slot.active.store(Some(previous));
            }
            SearchError::DeletionFailed(format!("Failed to remove {}: {}", dir.display(), e))
        })?;
        Ok(true)
    }

    async fn count(&self, kind: IndexKind) -> SearchResult<u64> {
        Ok(self.active(kind)?.reader.searcher().num_docs())
    }

    async fn search(&self, kind: IndexKind, query: &FullTextQuery) -> SearchResult<Vec<FullTextHit>> {
        let generation = self.active(kind)?;
        let searcher = generation.reader.searcher();

        let tantivy_query = QueryBuilder::new(&generation.schema, &generation.index).build(query)?;
        let limit = query.limit.max(1);
        let top_docs: Vec<(Score, DocAddress)> = if query.by_frequency {
            let collector = TopDocs::with_limit(limit).tweak_score(|segment_reader: &SegmentReader| {
                let frequencies = segment_reader.fast_fields().u64(FREQUENCY).ok();
                move |doc: DocId, score: Score| {
                    let frequency = frequencies.as_ref().and_then(|column| column.first(doc)).unwrap_or(0);
                    (frequency, score)
                }
            });
            searcher
                .search(&*tantivy_query, &collector)
                .map_err(|e| SearchError::SearchFailed(format!("Search execution failed: {}", e)))?
                .into_iter()
                .map(|((_, score), address)| (score, address))
                .collect()
        } else {
            searcher
                .search(&*tantivy_query, &TopDocs::with_limit(limit))
                .map_err(|e| SearchError::SearchFailed(format!("Search execution failed: {}", e)))?
        };

        let snippets = generation
            .schema
            .get_field(&Self::snippet_attr(kind).field_name())
            .ok()
            .and_then(|field| SnippetGenerator::create(&searcher, &*tantivy_query, field).ok())
            .map(|mut generator| {
                generator.set_max_num_chars(self.snippet_max_chars);
                generator
            });

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| SearchError::SearchFailed(format!("Failed to retrieve doc: {}", e)))?;
            let record = Self::payload(&generation.schema, &doc)?;

            let snippet = snippets
                .as_ref()
                .map(|generator| generator.snippet_from_doc(&doc))
                .filter(|snippet| !snippet.is_empty())
                .map(|snippet| snippet.to_html());

            hits.push(FullTextHit {
                doc_id: record.id().to_string(),
                score: f64::from(score),
                snippet,
                record,
            });
        }

        Ok(hits)
    }

    async fn records(&self, kind: IndexKind) -> SearchResult<Vec<CandidateRecord>> {
        let generation = match self.slot(kind)?.active.load_full() {
            Some(generation) => generation,
            None => return Ok(Vec::new()),
        };
        let searcher = generation.reader.searcher();
        let addresses = searcher.search(&AllQuery, &DocSetCollector)?;

        let mut records = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            records.push(Self::payload(&generation.schema, &doc)?);
        }
        Ok(records)
    }
}

/// The part of `IndexWriter` a batch write goes through
trait StagedWrites {
    fn delete(&mut self, term: Term);
    fn add(&mut self, doc: TantivyDocument) -> tantivy::Result<()>;
    fn commit(&mut self) -> tantivy::Result<()>;
    fn rollback(&mut self) -> tantivy::Result<()>;
}

impl StagedWrites for IndexWriter {
    fn delete(&mut self, term: Term) {
        self.delete_term(term);
    }

    fn add(&mut self, doc: TantivyDocument) -> tantivy::Result<()> {
        self.add_document(doc).map(|_| ())
    }

    fn commit(&mut self) -> tantivy::Result<()> {
        IndexWriter::commit(self).map(|_| ())
    }

    fn rollback(&mut self) -> tantivy::Result<()> {
        IndexWriter::rollback(self).map(|_| ())
    }
}

/// Queue `deletes` then `docs` and commit. On any failure every queued
/// operation is rolled back, so a later commit cannot persist half a batch.
fn apply_staged<W: StagedWrites>(writer: &mut W, deletes: Vec<Term>, docs: Vec<TantivyDocument>) -> SearchResult<()> {
    let stage = || -> SearchResult<()> {
        for term in deletes {
            writer.delete(term);
        }
        for (position, doc) in docs.into_iter().enumerate() {
            writer.add(doc).map_err(|e| {
                SearchError::IndexingFailed(format!("Failed to add document {}: {}", position, e))
            })?;
        }
        writer
            .commit()
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to commit: {}", e)))
    };

    let result = stage();
    if result.is_err() {
        if let Err(e) = writer.rollback() {
            warn!(error = %e, "Rollback of failed batch also failed");
        }
    }
    result
}

fn generation_dir(root: &Path, name: &str, id: u64) -> PathBuf {
    root.join(name).join(format!("gen-{}", id))
}

fn read_current(index_dir: &Path) -> Option<u64> {
    std::fs::read_to_string(index_dir.join(CURRENT_FILE))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Atomic pointer update: write a temp file, then rename over CURRENT.
fn write_current(index_dir: &Path, id: u64) -> SearchResult<()> {
    std::fs::create_dir_all(index_dir)?;
    let tmp = index_dir.join(format!("{}.tmp", CURRENT_FILE));
    std::fs::write(&tmp, id.to_string())?;
    std::fs::rename(&tmp, index_dir.join(CURRENT_FILE))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DimensionValueRecord, FieldRecord, FieldType};
    use crate::search::config::Analyzer;
    use tempfile::TempDir;

    fn on_disk(dir: &TempDir) -> IndexConfig {
        IndexConfig {
            root_path: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn order_status() -> FieldRecord {
        FieldRecord::new("dwd_order", "order_status", "订单状态", FieldType::Dimension)
            .with_aliases(vec!["状态"])
    }

    #[tokio::test]
    async fn test_create_is_noop_when_present() {
        let backend = TantivyBackend::open(IndexConfig::in_memory("t")).unwrap();
        assert!(!backend.exists(IndexKind::Fields).await.unwrap());
        assert!(backend.create(IndexKind::Fields, false).await.unwrap());
        assert!(!backend.create(IndexKind::Fields, false).await.unwrap());
        assert!(backend.create(IndexKind::Fields, true).await.unwrap());
        assert_eq!(backend.count(IndexKind::Fields).await.unwrap(), 0);
        assert_eq!(backend.index_name(IndexKind::Metrics), "t_metrics");
    }

    #[tokio::test]
    async fn test_replace_all_and_keyword_search() {
        let backend = TantivyBackend::open(IndexConfig::in_memory("t")).unwrap();
        let field = order_status();
        let docs = vec![
            IndexDocument::from(&DimensionValueRecord::new(&field, "已完成", 15420)),
            IndexDocument::from(&DimensionValueRecord::new(&field, "已取消", 120)),
        ];
        let info = backend.replace_all(IndexKind::DimensionValues, docs).await.unwrap();
        assert_eq!(info.document_count, 2);

        let hits = backend
            .search(
                IndexKind::DimensionValues,
                &FullTextQuery::new("已完成").with_tokenize(false),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.label(), "已完成");
        assert_eq!(hits[0].record.frequency(), Some(15420));
    }

    #[tokio::test]
    async fn test_ngram_search_matches_partial_cjk() {
        let backend = TantivyBackend::open(IndexConfig::in_memory("t")).unwrap();
        backend
            .replace_all(IndexKind::Fields, vec![IndexDocument::from(&order_status())])
            .await
            .unwrap();

        let hits = backend
            .search(
                IndexKind::Fields,
                &FullTextQuery::new("查询订单").with_analyzer(Analyzer::Ngram),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "field:dwd_order.order_status");
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_removes() {
        let backend = TantivyBackend::open(IndexConfig::in_memory("t")).unwrap();
        let a = FieldRecord::new("t", "a", "甲", FieldType::Attribute);
        let b = FieldRecord::new("t", "b", "乙", FieldType::Attribute);
        backend
            .replace_all(IndexKind::Fields, vec![IndexDocument::from(&a), IndexDocument::from(&b)])
            .await
            .unwrap();

        let renamed = a.clone().with_description("改名");
        let info = backend
            .upsert(
                IndexKind::Fields,
                vec![IndexDocument::from(&renamed)],
                vec!["field:t.b".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(info.document_count, 1);

        let records = backend.records(IndexKind::Fields).await.unwrap();
        assert_eq!(records, vec![CandidateRecord::from(renamed)]);
    }

    #[tokio::test]
    async fn test_generation_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let backend = TantivyBackend::open(on_disk(&dir)).unwrap();
            backend
                .replace_all(IndexKind::Fields, vec![IndexDocument::from(&order_status())])
                .await
                .unwrap();
            let info = backend
                .replace_all(IndexKind::Fields, vec![IndexDocument::from(&order_status())])
                .await
                .unwrap();
            assert_eq!(info.generation, 2);
            assert!(!dir.path().join("kman_fields").join("gen-1").exists());
        }

        let reopened = TantivyBackend::open(on_disk(&dir)).unwrap();
        assert!(reopened.exists(IndexKind::Fields).await.unwrap());
        assert_eq!(reopened.count(IndexKind::Fields).await.unwrap(), 1);
        assert!(!reopened.exists(IndexKind::Metrics).await.unwrap());
    }

    #[derive(Default)]
    struct RecordingWriter {
        fail_add_at: Option<usize>,
        deletes: usize,
        adds: usize,
        committed: bool,
        rolled_back: bool,
    }

    impl StagedWrites for RecordingWriter {
        fn delete(&mut self, _term: Term) {
            self.deletes += 1;
        }

        fn add(&mut self, _doc: TantivyDocument) -> tantivy::Result<()> {
            if self.fail_add_at == Some(self.adds) {
                return Err(tantivy::TantivyError::ErrorInThread("indexing thread died".to_string()));
            }
            self.adds += 1;
            Ok(())
        }

        fn commit(&mut self) -> tantivy::Result<()> {
            self.committed = true;
            Ok(())
        }

        fn rollback(&mut self) -> tantivy::Result<()> {
            self.rolled_back = true;
            Ok(())
        }
    }

    #[test]
    fn test_failed_add_rolls_back_queued_deletes() {
        let schema = build_schema();
        let id_field = schema.get_field(DOC_ID).unwrap();
        let a = FieldRecord::new("t", "a", "甲", FieldType::Attribute);
        let b = FieldRecord::new("t", "b", "乙", FieldType::Attribute);
        let docs = vec![
            IndexDocument::from(&a).to_tantivy_doc(&schema).unwrap(),
            IndexDocument::from(&b).to_tantivy_doc(&schema).unwrap(),
        ];
        let deletes = vec![
            Term::from_field_text(id_field, "field:t.a"),
            Term::from_field_text(id_field, "field:t.b"),
        ];

        let mut writer = RecordingWriter {
            fail_add_at: Some(1),
            ..Default::default()
        };
        let result = apply_staged(&mut writer, deletes, docs);

        assert!(matches!(result, Err(SearchError::IndexingFailed(_))));
        assert_eq!(writer.deletes, 2);
        assert!(!writer.committed);
        assert!(writer.rolled_back);
    }

    #[tokio::test]
    async fn test_frequency_order_applies_before_limit() {
        let backend = TantivyBackend::open(IndexConfig::in_memory("t")).unwrap();
        let field = order_status();
        backend
            .replace_all(
                IndexKind::DimensionValues,
                vec![
                    IndexDocument::from(&DimensionValueRecord::new(&field, "已完成", 10)),
                    IndexDocument::from(&DimensionValueRecord::new(&field, "已完成退款", 9999)),
                ],
            )
            .await
            .unwrap();

        let query = FullTextQuery::new("已完成")
            .with_analyzer(Analyzer::Ngram)
            .with_limit(1);
        let by_relevance = backend.search(IndexKind::DimensionValues, &query).await.unwrap();
        assert_eq!(by_relevance[0].record.label(), "已完成");

        let by_frequency = backend
            .search(IndexKind::DimensionValues, &query.with_frequency_order())
            .await
            .unwrap();
        assert_eq!(by_frequency.len(), 1);
        assert_eq!(by_frequency[0].record.frequency(), Some(9999));
        assert!(by_frequency[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_delete_reports_absence() {
        let dir = TempDir::new().unwrap();
        let backend = TantivyBackend::open(on_disk(&dir)).unwrap();
        assert!(!backend.delete(IndexKind::Metrics).await.unwrap());

        backend.create(IndexKind::Metrics, false).await.unwrap();
        assert!(backend.delete(IndexKind::Metrics).await.unwrap());
        assert!(!dir.path().join("kman_metrics").exists());
        assert!(matches!(
            backend.count(IndexKind::Metrics).await,
            Err(SearchError::IndexNotFound(_))
        ));
    }
}
