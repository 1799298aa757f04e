//! Test fixtures for generating chunk data.

use bouncer_core::{format_chunk_file, Chunk, ChunkList, ChunkType};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::Path;

/// SHA-256 of a label, the shape of real list entries.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn full_hash(label: &str) -> Bytes {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    Bytes::copy_from_slice(&hasher.finalize())
}

/// First four bytes of [`full_hash`], what shavar clients send to gethash.
#[allow(dead_code)]
pub fn prefix_of(label: &str) -> Bytes {
    full_hash(label).slice(..4)
}

/// Build an add chunk whose hashes are the SHA-256 of each label.
#[allow(dead_code)]
pub fn add_chunk(number: u32, labels: &[&str]) -> Chunk {
    Chunk::new(ChunkType::Add, number, 32, labels.iter().map(|l| full_hash(l))).unwrap()
}

/// Build a sub chunk whose hashes are the SHA-256 of each label.
#[allow(dead_code)]
pub fn sub_chunk(number: u32, labels: &[&str]) -> Chunk {
    Chunk::new(ChunkType::Sub, number, 32, labels.iter().map(|l| full_hash(l))).unwrap()
}

/// Write chunks to `path` in the chunk-file format.
#[allow(dead_code)]
pub fn write_chunk_file(path: &Path, chunks: &[Chunk]) {
    let mut list = ChunkList::new();
    for chunk in chunks {
        list.insert(chunk.clone()).unwrap();
    }
    std::fs::write(path, format_chunk_file(&list)).expect("failed to write chunk file");
}
