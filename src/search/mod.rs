//! Full-text search and hybrid matching
//!
//! Three engines answer every hybrid query:
//!
//! - **Full-text**: Tantivy relevance over the fields, dimension value and
//!   metric indices, with keyword (`tokenize = false`) or analyzed matching
//! - **Pattern**: Aho-Corasick exact matching over every catalog name, alias
//!   and value
//! - **Similarity**: fuzzy scoring over a bounded slice of the catalog
//!
//! ```text
//!                 SearchService
//!       search() / suggest() / extract_entities()
//!                      |
//!         tokio::join! with per-engine deadline
//!       /              |                  \
//!  FullTextBackend   Catalog          SimilarityMatcher
//!  (generations)     (AC automaton)   (bounded scan)
//!       \              |                  /
//!                  HybridFuser
//! ```
//!
//! # Example
//!
//! ```no_run
//! use metadata_discovery::search::{SearchMethod, SearchRequest};
//!
//! let request = SearchRequest::new("已完成", SearchMethod::DimensionValues).with_size(5);
//! ```

mod backend;
mod config;
mod document;
mod error;
mod fusion;
mod query;
mod service;
mod tantivy_backend;

pub use backend::{FullTextBackend, FullTextHit, GenerationInfo};
pub use config::{
    Analyzer, EngineNormalization, EngineWeights, IndexConfig, ScoreNormalization, SearchConfig,
    SearchConfigBuilder,
};
pub use document::{IndexDocument, TextAttr};
pub use error::{SearchError, SearchResult};
pub use fusion::{normalize_scores, FusedResult, HybridFuser};
pub use query::{FullTextQuery, QueryBuilder, SearchFilter};
pub use service::{
    EngineFailure, ExtractedEntity, SearchMethod, SearchRequest, SearchResponse, SearchService,
    Suggestion,
};
pub use tantivy_backend::TantivyBackend;
