//! Data Transfer Objects
//!
//! JSON shapes of the non-streaming endpoints.

use serde::{Deserialize, Serialize};

use crate::search::Options;

/// Query of `GET /files`
#[derive(Debug, Default, Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    pub dir: String,
    #[serde(default)]
    pub hidden: bool,
    /// Accepted for compatibility; this server has no cluster of its own
    #[serde(default)]
    pub local: bool,
}

/// Full health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded
    pub status: String,
    /// Backend description
    pub backend: String,
    /// Effective backend options
    pub backend_options: Options,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
