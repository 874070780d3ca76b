pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::service::DiscoveryService;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DiscoveryService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<DiscoveryService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }
}
