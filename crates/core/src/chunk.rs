//! Chunk and chunk list types.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Whether a chunk adds hashes to a list or subtracts them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkType {
    Add,
    Sub,
}

impl ChunkType {
    /// The single-character marker used on the wire and on disk.
    pub fn marker(self) -> char {
        match self {
            Self::Add => 'a',
            Self::Sub => 's',
        }
    }

    /// Parse a wire marker.
    pub fn from_marker(marker: &str) -> Result<Self> {
        match marker {
            "a" => Ok(Self::Add),
            "s" => Ok(Self::Sub),
            other => Err(Error::Parse(format!("invalid chunk type \"{other}\""))),
        }
    }

    fn kind(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

/// A numbered batch of fixed-length hashes distributed as one update unit.
///
/// `(chunk_type, number)` is a chunk's identity within its list. Chunks are
/// immutable once constructed; a source reload replaces them wholesale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    chunk_type: ChunkType,
    number: u32,
    hash_size: usize,
    hashes: BTreeSet<Bytes>,
}

impl Chunk {
    /// Create a chunk, validating that every hash is exactly `hash_size` bytes.
    pub fn new(
        chunk_type: ChunkType,
        number: u32,
        hash_size: usize,
        hashes: impl IntoIterator<Item = Bytes>,
    ) -> Result<Self> {
        let hashes: BTreeSet<Bytes> = hashes.into_iter().collect();
        for hash in &hashes {
            if hash.len() != hash_size {
                return Err(Error::HashLength {
                    expected: hash_size,
                    actual: hash.len(),
                });
            }
        }
        Ok(Self {
            chunk_type,
            number,
            hash_size,
            hashes,
        })
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    /// Number of hashes in this chunk.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Iterate the hashes in deterministic (byte-sorted) order.
    pub fn hashes(&self) -> impl Iterator<Item = &Bytes> {
        self.hashes.iter()
    }

    /// Whether any hash in this chunk starts with `prefix`.
    pub fn contains_prefix(&self, prefix: &[u8]) -> bool {
        self.hashes.iter().any(|h| h.starts_with(prefix))
    }

    /// All hashes in this chunk starting with `prefix`, in deterministic order.
    pub fn hashes_with_prefix(&self, prefix: &[u8]) -> Vec<Bytes> {
        self.hashes
            .iter()
            .filter(|h| h.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Total payload length in bytes when serialized.
    pub fn payload_len(&self) -> usize {
        self.hashes.len() * self.hash_size
    }
}

/// The add and subtract chunk sets of one list, keyed by chunk number.
///
/// Produced atomically by a parser call and owned by one source; a reload
/// produces a brand-new `ChunkList` so concurrent readers always observe a
/// complete snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkList {
    adds: BTreeMap<u32, Chunk>,
    subs: BTreeMap<u32, Chunk>,
}

impl ChunkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk. Duplicate `(type, number)` pairs are an error.
    pub fn insert(&mut self, chunk: Chunk) -> Result<()> {
        let target = match chunk.chunk_type() {
            ChunkType::Add => &mut self.adds,
            ChunkType::Sub => &mut self.subs,
        };
        if target.contains_key(&chunk.number()) {
            return Err(Error::DuplicateChunk {
                kind: chunk.chunk_type().kind(),
                number: chunk.number(),
            });
        }
        target.insert(chunk.number(), chunk);
        Ok(())
    }

    pub fn add(&self, number: u32) -> Option<&Chunk> {
        self.adds.get(&number)
    }

    pub fn sub(&self, number: u32) -> Option<&Chunk> {
        self.subs.get(&number)
    }

    /// All known add chunk numbers.
    pub fn add_numbers(&self) -> BTreeSet<u32> {
        self.adds.keys().copied().collect()
    }

    /// All known sub chunk numbers.
    pub fn sub_numbers(&self) -> BTreeSet<u32> {
        self.subs.keys().copied().collect()
    }

    /// All add chunks containing a hash that starts with `prefix`,
    /// in ascending chunk-number order.
    pub fn find_prefix(&self, prefix: &[u8]) -> Vec<&Chunk> {
        self.adds
            .values()
            .filter(|c| c.contains_prefix(prefix))
            .collect()
    }

    /// Iterate all chunks, adds then subs, ascending by number.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.adds.values().chain(self.subs.values())
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.subs.is_empty()
    }

    /// Total number of chunks (adds plus subs).
    pub fn len(&self) -> usize {
        self.adds.len() + self.subs.len()
    }
}

/// Chunk numbers the client is missing: `current \ claimed`, ascending.
pub fn delta(current: &BTreeSet<u32>, claimed: &BTreeSet<u32>) -> Vec<u32> {
    current.difference(claimed).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hash32(seed: u8) -> Bytes {
        Bytes::from(vec![seed; 32])
    }

    #[test]
    fn test_chunk_rejects_wrong_hash_length() {
        let err = Chunk::new(ChunkType::Add, 1, 32, [Bytes::from_static(b"shrt")]).unwrap_err();
        assert!(matches!(
            err,
            Error::HashLength {
                expected: 32,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_chunk_prefix_lookup() {
        let mut h = vec![0u8; 32];
        h[..4].copy_from_slice(b"\xd0\xe1\x96\xa0");
        let chunk = Chunk::new(ChunkType::Add, 1, 32, [Bytes::from(h), hash32(7)]).unwrap();

        assert!(chunk.contains_prefix(b"\xd0\xe1\x96\xa0"));
        assert!(!chunk.contains_prefix(b"\x00\x00\x00\x00"));
        assert_eq!(chunk.hashes_with_prefix(b"\xd0\xe1\x96\xa0").len(), 1);
    }

    #[test]
    fn test_duplicate_chunk_number_rejected() {
        let mut list = ChunkList::new();
        list.insert(Chunk::new(ChunkType::Add, 1, 32, [hash32(1)]).unwrap())
            .unwrap();
        // Same number, other type: fine.
        list.insert(Chunk::new(ChunkType::Sub, 1, 32, [hash32(2)]).unwrap())
            .unwrap();
        let err = list
            .insert(Chunk::new(ChunkType::Add, 1, 32, [hash32(3)]).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateChunk {
                kind: "add",
                number: 1
            }
        ));
    }

    #[test]
    fn test_find_prefix_ignores_sub_chunks() {
        let mut list = ChunkList::new();
        let mut h = vec![0u8; 32];
        h[..4].copy_from_slice(b"pref");
        list.insert(Chunk::new(ChunkType::Sub, 3, 32, [Bytes::from(h)]).unwrap())
            .unwrap();
        assert!(list.find_prefix(b"pref").is_empty());
    }

    #[test]
    fn test_delta_basic() {
        let current: BTreeSet<u32> = [1, 2, 4, 5].into_iter().collect();
        let claimed: BTreeSet<u32> = [1, 2].into_iter().collect();
        assert_eq!(delta(&current, &claimed), vec![4, 5]);
    }

    proptest! {
        #[test]
        fn prop_delta_is_sorted_set_difference(
            current in proptest::collection::btree_set(0u32..500, 0..64),
            extra in proptest::collection::btree_set(0u32..500, 0..64),
        ) {
            // claimed is an arbitrary subset of current plus some noise the
            // server has never seen
            let claimed: BTreeSet<u32> = current
                .iter()
                .filter(|n| *n % 2 == 0)
                .chain(extra.iter())
                .copied()
                .collect();

            let d = delta(&current, &claimed);
            let mut sorted = d.clone();
            sorted.sort_unstable();
            prop_assert_eq!(&d, &sorted);
            for n in &d {
                prop_assert!(current.contains(n) && !claimed.contains(n));
            }
            for n in &current {
                prop_assert!(claimed.contains(n) || d.contains(n));
            }
        }
    }
}
