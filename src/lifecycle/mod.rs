//! Index lifecycle management
//!
//! Tracks the state of the fields, dimension value and metric indices and
//! drives every create, refresh and delete through the full-text backend.

mod error;
mod manager;

pub use error::{LifecycleError, LifecycleResult};
pub use manager::{
    CreateOutcome, CreateReport, DeleteOutcome, DeleteReport, DeleteSummary, IndexLifecycleManager,
    IndexUpdate,
};
