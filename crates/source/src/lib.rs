//! Chunk data origins for the Bouncer blocklist server.
//!
//! A [`ChunkSource`] owns one list's cached chunk data and keeps it fresh
//! from its origin: a local chunk file, a local directory with an
//! `index.json`, a single S3 object, or an S3 directory. Staleness is
//! detected cheaply (mtime+length locally, ETag on S3) and reloads are
//! single-flight.

pub mod error;
pub mod origin;
pub mod s3;
pub mod source;

pub use error::{SourceError, SourceResult};
pub use origin::{ChangeToken, Origin};
pub use source::ChunkSource;
