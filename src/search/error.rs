//! Search Error Types
//!
//! Every failure a backend can produce, whether returned synchronously
//! (factories, `files`) or delivered through a result's error stream.

use thiserror::Error;

use crate::codec::CodecError;

/// Errors produced by backends, the registry and the result channel
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    /// Network or I/O failure before a response was fully consumed
    #[error("failed to send HTTP request: {0}")]
    TransportFailed(String),

    /// Remote peer answered with a non-200 status
    #[error("invalid HTTP response status: {status} ({message})")]
    ProtocolStatusBad { status: u16, message: String },

    /// Unknown or malformed frame discriminator
    #[error("unknown data tag received: {0}")]
    BadTag(String),

    /// Frame body failed to parse at the expected type
    #[error("failed to decode {what}: {reason}")]
    PayloadDecodeFailed { what: &'static str, reason: String },

    /// Operation on an already closed result
    #[error("result channel is closed")]
    ClosedChannel,

    /// Directory listing children disagree on the listed path
    #[error("inconsistent directory path {0:?} != {1:?}")]
    InconsistentPath(String, String),

    /// Directory listing children disagree on the catalog
    #[error("inconsistent catalog {0:?} != {1:?}")]
    InconsistentCatalog(String, String),

    /// A backend refused to start a query
    #[error("failed to start search backend: {0}")]
    BackendStartFailed(String),

    /// Registry miss
    #[error("{0:?} is unknown search backend")]
    UnknownBackend(String),

    /// Option parsing failed
    #[error("failed to parse {key:?} option: {reason}")]
    ConfigInvalid { key: String, reason: String },

    /// Input or output path escapes the home directory
    #[error("{what} {path:?} is not relative to home")]
    OutsideHome { what: &'static str, path: String },

    /// Error text reported by a backend or forwarded from a peer
    #[error("{0}")]
    Remote(String),

    /// Wire codec failure
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl SearchError {
    /// Shorthand for an error frame carrying plain text
    pub fn remote(message: impl Into<String>) -> Self {
        SearchError::Remote(message.into())
    }

    /// Shorthand for an option parsing failure
    pub fn config(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SearchError::ConfigInvalid {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;
