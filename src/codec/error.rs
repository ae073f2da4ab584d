//! Codec Error Types

use thiserror::Error;

/// Wire codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Downstream writer rejected bytes
    #[error("failed to write: {0}")]
    WriteFailed(String),

    /// Upstream reader failed
    #[error("failed to read: {0}")]
    ReadFailed(String),

    /// Upstream reader ended in the middle of the stream
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Unknown or malformed frame discriminator
    #[error("unknown data tag received: {0}")]
    BadTag(String),

    /// Frame body could not be parsed at the expected type
    #[error("malformed payload: {0}")]
    PayloadDecodeFailed(String),

    /// Encoding was attempted after `close`
    #[error("encoder is already closed")]
    Closed,

    /// Tag/payload alternation was not respected
    #[error("out of order: {0}")]
    OutOfOrder(&'static str),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        CodecError::WriteFailed(e.to_string())
    }
}
