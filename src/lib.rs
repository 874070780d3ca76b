//! Metadata discovery service
//!
//! Keeps a searchable catalog of warehouse fields, business metrics and the
//! distinct values of dimension columns. Queries run through three engines
//! (full-text, exact multi-pattern and fuzzy similarity) whose results are
//! fused into one ranking. Index contents are refreshed by sync runs that
//! pull from the upstream metadata source and the relational sources.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extraction;
pub mod lifecycle;
pub mod matcher;
pub mod metrics;
pub mod models;
pub mod outcome;
pub mod retry;
pub mod scheduler;
pub mod search;
pub mod service;
pub mod sources;
pub mod sync;

pub use config::Config;
pub use error::{AppError, Result};
pub use service::DiscoveryService;
