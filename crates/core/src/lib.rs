//! Core domain types and shared logic for the Bouncer blocklist server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Add/subtract chunks and chunk lists
//! - Wire-format parsers for client requests and persisted chunk data
//! - Response formatters for the downloads and gethash endpoints
//! - Client version matching for version-qualified lists
//! - Configuration types

pub mod chunk;
pub mod config;
pub mod error;
pub mod format;
pub mod parse;
pub mod version;

pub use chunk::{delta, Chunk, ChunkList, ChunkType};
pub use config::{AppConfig, ListConfig, ListType, ProtocolConfig, ServerConfig};
pub use error::{Error, Result};
pub use format::{format_chunk_file, DownloadsResponse, GethashResponse, ListPayload, ListUpdate};
pub use parse::{
    parse_chunk_file, parse_directory_index, parse_downloads, parse_gethash, DirectoryIndex,
    DownloadsRequest, ListClaim,
};

/// Size of a hash prefix in bytes.
pub const PREFIX_SIZE: usize = 4;

/// Size of a full digest hash in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Upper bound on the number of chunk numbers one request line may claim.
///
/// Range claims expand server-side; an unbounded `low-high` range is a
/// denial-of-service vector, so expansion fails fast past this limit.
pub const MAX_CLAIMED_CHUNKS: usize = 100_000;
