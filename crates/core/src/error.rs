//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("duplicate {kind} chunk number: {number}")]
    DuplicateChunk { kind: &'static str, number: u32 },

    #[error("hash length mismatch: expected {expected} bytes, got {actual}")]
    HashLength { expected: usize, actual: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
