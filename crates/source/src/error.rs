//! Source error types.

use thiserror::Error;

/// Source operation errors.
///
/// `NoData` is deliberately separate from `Parse`: a known list whose origin
/// currently has nothing to serve is a normal operational state, while
/// malformed chunk data is not.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("known list, no data found: {0}")]
    NoData(String),

    #[error("error parsing {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: bouncer_core::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(Box<dyn std::error::Error + Send + Sync>),

    #[error("origin fetch timed out after {seconds}s: {url}")]
    Timeout { url: String, seconds: u64 },

    #[error("unknown {kind} chunk number {number} requested")]
    UnknownChunk { kind: &'static str, number: u32 },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
