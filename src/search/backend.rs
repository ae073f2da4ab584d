//! Backend Contract
//!
//! Capability set shared by local engines, remote peers and the
//! multiplexer. Streaming operations return as soon as the producer task
//! is running; `files` answers synchronously.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use super::config::SearchConfig;
use super::error::{SearchError, SearchResult};
use super::files::DirInfo;
use super::result::ResultReceiver;

/// Option mapping passed to backend factories
pub type Options = serde_json::Map<String, Value>;

/// A search backend
#[async_trait]
pub trait Backend: Send + Sync + fmt::Display {
    /// Short registry name of the backend kind
    fn name(&self) -> &str;

    /// Effective options of this instance
    fn options(&self) -> Options;

    /// Start a search streaming records, errors and statistics
    fn search(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver>;

    /// Start a search over packet captures
    fn pcap_search(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.search(cfg)
    }

    /// Start a lookup of previously found records
    fn show(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.search(cfg)
    }

    /// Start a statistics-only search
    fn count(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.search(&cfg.clone().count_only())
    }

    /// List a directory
    async fn files(&self, path: &str, hidden: bool) -> SearchResult<DirInfo>;
}

/// Typed access to factory options
pub trait OptionsExt {
    fn get_string(&self, key: &str) -> SearchResult<Option<String>>;
    fn get_bool(&self, key: &str) -> SearchResult<Option<bool>>;
    fn get_u64(&self, key: &str) -> SearchResult<Option<u64>>;
}

impl OptionsExt for Options {
    fn get_string(&self, key: &str) -> SearchResult<Option<String>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(SearchError::config(key, format!("expected string, found {}", other))),
        }
    }

    fn get_bool(&self, key: &str) -> SearchResult<Option<bool>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|e| SearchError::config(key, e)),
            Some(other) => Err(SearchError::config(key, format!("expected bool, found {}", other))),
        }
    }

    fn get_u64(&self, key: &str) -> SearchResult<Option<u64>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| SearchError::config(key, format!("expected unsigned integer, found {}", n))),
            Some(Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|e| SearchError::config(key, e)),
            Some(other) => Err(SearchError::config(key, format!("expected unsigned integer, found {}", other))),
        }
    }
}
