//! Application State
//!
//! Shared state accessible by all API handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::config::ApiConfig;
use crate::search::Backend;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Backend answering every query
    pub backend: Arc<dyn Backend>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, config: ApiConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
