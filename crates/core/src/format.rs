//! Response formatters for the downloads and gethash endpoints, plus the
//! chunk-file writer.
//!
//! Formatting is pure: handlers assemble the typed response value and call
//! `to_bytes()`. Everything here round-trips through the parsers in
//! [`crate::parse`].

use crate::chunk::{Chunk, ChunkList};
use bytes::{BufMut, Bytes, BytesMut};

/// Serialize one chunk as `<a|s>:<num>:<hashSize>:<len>\n<payload>`.
pub fn write_chunk(buf: &mut BytesMut, chunk: &Chunk) {
    buf.put_slice(
        format!(
            "{}:{}:{}:{}\n",
            chunk.chunk_type(),
            chunk.number(),
            chunk.hash_size(),
            chunk.payload_len()
        )
        .as_bytes(),
    );
    for hash in chunk.hashes() {
        buf.put_slice(hash);
    }
}

/// Serialize a whole chunk list in the on-disk chunk-file format: add chunks
/// then sub chunks, ascending by number. `parse_chunk_file` reads this back
/// byte for byte.
pub fn format_chunk_file(chunks: &ChunkList) -> Bytes {
    let mut buf = BytesMut::new();
    for number in chunks.add_numbers() {
        write_chunk(&mut buf, chunks.add(number).unwrap());
    }
    for number in chunks.sub_numbers() {
        write_chunk(&mut buf, chunks.sub(number).unwrap());
    }
    buf.freeze()
}

/// How one list's update data is delivered.
#[derive(Clone, Debug)]
pub enum ListPayload {
    /// Chunk records embedded directly in the response body.
    Inline { adds: Vec<Chunk>, subs: Vec<Chunk> },
    /// One `u:` redirect line per chunk the client should fetch.
    Redirect {
        base_url: String,
        chunk_numbers: Vec<u32>,
    },
}

/// The update section for one list within a downloads response.
#[derive(Clone, Debug)]
pub struct ListUpdate {
    pub name: String,
    /// Add chunk numbers the client claimed but the server no longer has.
    pub stale_adds: Vec<u32>,
    /// Sub chunk numbers the client claimed but the server no longer has.
    pub stale_subs: Vec<u32>,
    pub payload: ListPayload,
}

/// A complete downloads response body.
#[derive(Clone, Debug)]
pub struct DownloadsResponse {
    /// Seconds the client should wait before polling again (`n:` line).
    pub interval_secs: u32,
    pub updates: Vec<ListUpdate>,
}

impl DownloadsResponse {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(format!("n:{}\n", self.interval_secs).as_bytes());

        for update in &self.updates {
            buf.put_slice(format!("i:{}\n", update.name).as_bytes());
            if !update.stale_adds.is_empty() {
                buf.put_slice(format!("ad:{}\n", join_numbers(&update.stale_adds)).as_bytes());
            }
            if !update.stale_subs.is_empty() {
                buf.put_slice(format!("sd:{}\n", join_numbers(&update.stale_subs)).as_bytes());
            }
            match &update.payload {
                ListPayload::Inline { adds, subs } => {
                    for chunk in adds.iter().chain(subs.iter()) {
                        write_chunk(&mut buf, chunk);
                    }
                }
                ListPayload::Redirect {
                    base_url,
                    chunk_numbers,
                } => {
                    let base = base_url.trim_end_matches('/');
                    for number in chunk_numbers {
                        buf.put_slice(format!("u:{}/{}/{}\n", base, update.name, number).as_bytes());
                    }
                }
            }
        }

        buf.freeze()
    }
}

fn join_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// A gethash response: every `(list, chunk)` pair holding a hash that starts
/// with one of the queried prefixes, with the matching hashes.
#[derive(Clone, Debug, Default)]
pub struct GethashResponse {
    /// `(list name, chunk number, matching hashes)`, already grouped.
    pub matches: Vec<(String, u32, Vec<Bytes>)>,
}

impl GethashResponse {
    /// An empty response is delivered as 204 No Content, not an empty body.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for (list, chunk_number, hashes) in &self.matches {
            let payload_len: usize = hashes.iter().map(|h| h.len()).sum();
            buf.put_slice(format!("{list}:{chunk_number}:{payload_len}\n").as_bytes());
            for hash in hashes {
                buf.put_slice(hash);
            }
        }
        buf.freeze()
    }
}
