//! # Fedsearch
//!
//! Search federation layer: runs pattern searches on local and remote
//! backends, merges their result streams and serves them over HTTP.
//!
//! ## Modules
//!
//! - [`search`]: Data model, result channel, backend contract and registry
//! - [`codec`]: Tag-framed text and binary stream codecs, batch encoders
//! - [`peer`]: Backend talking to a remote search server over HTTP
//! - [`mux`]: Fan-out multiplexer over several backends
//! - [`fake`]: Deterministic in-process backend
//! - [`api`]: HTTP server exposing any backend with the peer protocol
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fedsearch::search::{registry, Backend, SearchConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = json!({
//!         "backends": [
//!             {"name": "peer", "options": {"server-url": "http://node-1:8765"}},
//!             {"name": "peer", "options": {"server-url": "http://node-2:8765"}},
//!         ]
//!     });
//!     let backend = registry::create("mux", options.as_object().ok_or("options must be an object")?)?;
//!
//!     let mut result = backend.search(&SearchConfig::new("hello", ["*.txt"]).limit(100))?;
//!     let (records, errors) = result.drain().await;
//!
//!     println!("{} records, {} errors", records.len(), errors.len());
//!     if let Some(stat) = result.stat() {
//!         println!("{}", stat);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod codec;
pub mod config;
pub mod fake;
pub mod mux;
pub mod peer;
pub mod search;

// Re-export top-level types for convenience
pub use search::{
    channel, registry, Backend, DirInfo, Event, Index, NodeInfo, Options, Record, ResultHandle,
    ResultReceiver, ResultSender, SearchConfig, SearchError, SearchResult, Stat,
};

pub use codec::{CodecError, CodecResult, Format, Layout};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{ApiConfig, BackendConfig, Config, ConfigError, LoggingConfig};

pub use fake::FakeBackend;
pub use mux::MuxBackend;
pub use peer::{PeerBackend, PeerOptions};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.filter().into());
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = installed {
        eprintln!("failed to install logger: {}", e);
    }
}
