//! Sync orchestration
//!
//! Pulls fields and metrics from the metadata source and dimension values
//! from the relational sources, folds them into the catalog and pushes them
//! through the index lifecycle manager. At most one run is active at a time.

mod config;
mod error;
mod service;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use service::SyncService;
