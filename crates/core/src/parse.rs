//! Wire-format parsers.
//!
//! Three client/persisted formats are handled here:
//! - downloads request bodies (text, one list claim per line)
//! - gethash request bodies (text header + raw prefix payload)
//! - chunk files and directory index documents (the one true persisted format)
//!
//! The chunk file format is deliberately *not* delimiter-scanned for content:
//! only the `type:number:hashsize:length` header line is, and the payload is
//! then consumed by exact byte count, so hash bytes that happen to contain
//! newlines or colons cannot confuse the framing.

use crate::chunk::{Chunk, ChunkList, ChunkType};
use crate::error::{Error, Result};
use crate::MAX_CLAIMED_CHUNKS;
use bytes::Bytes;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Longest plausible chunk-file header: `a:4294967295:32:4294967295` plus
/// newline. Anything longer means the input is not a chunk file.
const MAX_CHUNK_HEADER: usize = 32;

/// Shortest possible chunk-file header: `a:1:4:4`.
const MIN_CHUNK_HEADER: usize = 7;

/// Bounds on the gethash header line. A downloads-shaped body sent to the
/// gethash endpoint trips these before we try to parse integers out of it.
const MAX_GETHASH_HEADER: usize = 24;

/// Upper bound on a gethash payload (declared, in bytes).
const MAX_GETHASH_PAYLOAD: usize = 1 << 20;

/// One line of a downloads request: the list name and the chunk numbers the
/// client claims to already hold.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListClaim {
    pub name: String,
    pub wants_mac: bool,
    pub adds: BTreeSet<u32>,
    pub subs: BTreeSet<u32>,
}

/// A parsed downloads request body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadsRequest {
    /// Client's size preference from an `s;<N>` first line, if present.
    pub size_hint: Option<u32>,
    pub claims: Vec<ListClaim>,
}

/// Parse a downloads request body.
///
/// `mac_allowed` is false for protocol 3.0 and newer, where a trailing `mac`
/// token is a hard error rather than a recorded preference.
pub fn parse_downloads(body: &str, mac_allowed: bool) -> Result<DownloadsRequest> {
    let mut parsed = DownloadsRequest::default();

    for (idx, line) in body.split('\n').enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("s;") {
            if idx != 0 {
                return Err(Error::Parse(
                    "size preference must be the first line".to_string(),
                ));
            }
            let size = rest.trim().parse::<u32>().map_err(|_| {
                Error::Parse(format!("invalid requested size \"{}\"", rest.trim()))
            })?;
            parsed.size_hint = Some(size);
            continue;
        }

        parsed.claims.push(parse_claim_line(line, mac_allowed)?);
    }

    Ok(parsed)
}

fn parse_claim_line(line: &str, mac_allowed: bool) -> Result<ListClaim> {
    let (name, spec) = line
        .split_once(';')
        .ok_or_else(|| Error::Parse(format!("malformed list line \"{line}\"")))?;

    let mut claim = ListClaim {
        name: name.to_string(),
        ..ListClaim::default()
    };

    let mut tokens: Vec<&str> = if spec.is_empty() {
        Vec::new()
    } else {
        spec.split(':').collect()
    };

    if tokens.last() == Some(&"mac") {
        if !mac_allowed {
            return Err(Error::Parse(format!(
                "MAC not supported in this protocol version (list \"{name}\")"
            )));
        }
        claim.wants_mac = true;
        tokens.pop();
    }

    // A bare `list-name;` claims nothing and is valid.
    if tokens.is_empty() || (tokens.len() == 1 && tokens[0].is_empty()) {
        return Ok(claim);
    }

    if tokens.len() % 2 != 0 {
        return Err(Error::Parse(format!(
            "odd chunk token count for list \"{name}\""
        )));
    }

    let mut expanded = 0usize;
    for pair in tokens.chunks(2) {
        let chunk_type = ChunkType::from_marker(pair[0])
            .map_err(|_| Error::Parse(format!("invalid chunk type \"{}\" for \"{name}\"", pair[0])))?;
        let target = match chunk_type {
            ChunkType::Add => &mut claim.adds,
            ChunkType::Sub => &mut claim.subs,
        };
        for piece in pair[1].split(',') {
            expand_chunk_piece(name, piece, target, &mut expanded)?;
        }
    }

    Ok(claim)
}

fn expand_chunk_piece(
    name: &str,
    piece: &str,
    target: &mut BTreeSet<u32>,
    expanded: &mut usize,
) -> Result<()> {
    if let Some((low, high)) = piece.split_once('-') {
        let low = low
            .parse::<u32>()
            .map_err(|_| Error::Parse(format!("invalid range \"{piece}\" for \"{name}\"")))?;
        let high = high
            .parse::<u32>()
            .map_err(|_| Error::Parse(format!("invalid range \"{piece}\" for \"{name}\"")))?;
        if low >= high {
            return Err(Error::Parse(format!(
                "inverted range \"{piece}\" for \"{name}\""
            )));
        }
        // Widened so a full-u32 range cannot overflow the count itself.
        let count = u64::from(high) - u64::from(low) + 1;
        if count > MAX_CLAIMED_CHUNKS as u64 {
            return Err(Error::Parse(format!(
                "claimed chunk count exceeds limit of {MAX_CLAIMED_CHUNKS} for \"{name}\""
            )));
        }
        *expanded += count as usize;
        if *expanded > MAX_CLAIMED_CHUNKS {
            return Err(Error::Parse(format!(
                "claimed chunk count exceeds limit of {MAX_CLAIMED_CHUNKS} for \"{name}\""
            )));
        }
        target.extend(low..=high);
    } else {
        let number = piece
            .parse::<u32>()
            .map_err(|_| Error::Parse(format!("invalid chunk \"{piece}\" for \"{name}\"")))?;
        *expanded += 1;
        if *expanded > MAX_CLAIMED_CHUNKS {
            return Err(Error::Parse(format!(
                "claimed chunk count exceeds limit of {MAX_CLAIMED_CHUNKS} for \"{name}\""
            )));
        }
        target.insert(number);
    }
    Ok(())
}

/// Parse a gethash request body into the set of unique prefixes it carries.
pub fn parse_gethash(body: &Bytes) -> Result<BTreeSet<Bytes>> {
    let eoh = body
        .iter()
        .take(MAX_GETHASH_HEADER)
        .position(|&b| b == b'\n')
        .ok_or_else(|| Error::Parse("gethash header missing or too long".to_string()))?;

    let header = std::str::from_utf8(&body[..eoh])
        .map_err(|_| Error::Parse("gethash header is not valid text".to_string()))?;
    let (prefix_len, payload_len) = header
        .split_once(':')
        .ok_or_else(|| Error::Parse(format!("malformed gethash header \"{header}\"")))?;
    let prefix_len: usize = prefix_len
        .parse()
        .map_err(|_| Error::Parse(format!("non-integer prefix length \"{prefix_len}\"")))?;
    let payload_len: usize = payload_len
        .parse()
        .map_err(|_| Error::Parse(format!("non-integer payload length \"{payload_len}\"")))?;

    if prefix_len == 0 || prefix_len > crate::DIGEST_SIZE {
        return Err(Error::Parse(format!(
            "prefix length out of range: {prefix_len}"
        )));
    }
    if payload_len == 0 || payload_len % prefix_len != 0 {
        return Err(Error::Parse(format!(
            "payload length {payload_len} is not a positive multiple of prefix length {prefix_len}"
        )));
    }
    if payload_len > MAX_GETHASH_PAYLOAD {
        return Err(Error::Parse(format!(
            "payload length {payload_len} exceeds limit of {MAX_GETHASH_PAYLOAD}"
        )));
    }

    let start = eoh + 1;
    let actual = body.len() - start;
    if actual < payload_len {
        return Err(Error::Parse(format!(
            "gethash payload truncated: declared {payload_len} bytes, got {actual}"
        )));
    }
    if actual > payload_len {
        return Err(Error::Parse(format!(
            "gethash length mismatch: client claimed {} bytes, read {}",
            start + payload_len,
            body.len()
        )));
    }

    let mut prefixes = BTreeSet::new();
    let mut pos = start;
    while pos < start + payload_len {
        prefixes.insert(body.slice(pos..pos + prefix_len));
        pos += prefix_len;
    }
    Ok(prefixes)
}

/// Parse a chunk file: back-to-back `<a|s>:<num>:<hashSize>:<len>\n<payload>`
/// records, tolerant of stray newlines between records.
pub fn parse_chunk_file(data: &Bytes) -> Result<ChunkList> {
    let mut chunks = ChunkList::new();
    let mut pos = 0usize;

    loop {
        while pos < data.len() && data[pos] == b'\n' {
            pos += 1;
        }
        if pos >= data.len() {
            break;
        }

        let window_end = (pos + MAX_CHUNK_HEADER).min(data.len());
        let eol = data[pos..window_end]
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| {
                Error::Parse(format!(
                    "chunk header missing newline within {MAX_CHUNK_HEADER} bytes at offset {pos}"
                ))
            })?;
        if eol < MIN_CHUNK_HEADER {
            return Err(Error::Parse(format!(
                "impossibly short chunk header at offset {pos}"
            )));
        }

        let header = std::str::from_utf8(&data[pos..pos + eol])
            .map_err(|_| Error::Parse(format!("chunk header is not valid text at offset {pos}")))?;
        let fields: Vec<&str> = header.split(':').collect();
        if fields.len() != 4 {
            return Err(Error::Parse(format!(
                "incorrect number of colons in chunk header \"{header}\""
            )));
        }

        let chunk_type = ChunkType::from_marker(fields[0])
            .map_err(|_| Error::Parse(format!("invalid chunk type in header \"{header}\"")))?;
        let number: u32 = fields[1]
            .parse()
            .map_err(|_| Error::Parse(format!("non-integer chunk number in \"{header}\"")))?;
        let hash_size: usize = fields[2]
            .parse()
            .map_err(|_| Error::Parse(format!("non-integer hash size in \"{header}\"")))?;
        let payload_len: usize = fields[3]
            .parse()
            .map_err(|_| Error::Parse(format!("non-integer payload length in \"{header}\"")))?;

        if hash_size != crate::PREFIX_SIZE && hash_size != crate::DIGEST_SIZE {
            return Err(Error::Parse(format!(
                "unsupported hash size {hash_size} in \"{header}\""
            )));
        }
        if payload_len % hash_size != 0 {
            return Err(Error::Parse(format!(
                "payload length not a multiple of hash size in \"{header}\""
            )));
        }

        let payload_start = pos + eol + 1;
        let payload_end = payload_start + payload_len;
        if payload_end > data.len() {
            return Err(Error::Parse(format!(
                "chunk data truncated for chunk {number}"
            )));
        }

        let hashes = (payload_start..payload_end)
            .step_by(hash_size)
            .map(|at| data.slice(at..at + hash_size));
        chunks.insert(Chunk::new(chunk_type, number, hash_size, hashes)?)?;

        pos = payload_end;
    }

    Ok(chunks)
}

/// A reference to one chunk file within a directory index.
///
/// Hash and prefix hints may be present in the document but are informational
/// only; chunk content is always re-derived from the referenced file.
#[derive(Clone, Debug, Deserialize)]
pub struct ChunkRef {
    pub path: String,
    #[serde(default)]
    pub hashes: Option<Vec<String>>,
    #[serde(default)]
    pub prefixes: Option<Vec<String>>,
}

/// A directory index document: metadata plus chunk-number → file mappings.
#[derive(Clone, Debug, Deserialize)]
pub struct DirectoryIndex {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub basedir: Option<String>,
    chunks: BTreeMap<String, ChunkRef>,
}

impl DirectoryIndex {
    /// Chunk entries as `(number, relative path)`, ascending by number.
    ///
    /// Paths are joined with `basedir` when one is set. `/` is used as the
    /// separator regardless of platform since the same index shape is served
    /// from object stores.
    pub fn entries(&self) -> Result<Vec<(u32, String)>> {
        let mut out = Vec::with_capacity(self.chunks.len());
        for (key, chunk_ref) in &self.chunks {
            let number: u32 = key.parse().map_err(|_| {
                Error::Parse(format!("non-integer chunk number \"{key}\" in index"))
            })?;
            let path = match &self.basedir {
                Some(base) if !base.is_empty() => {
                    format!("{}/{}", base.trim_end_matches('/'), chunk_ref.path)
                }
                _ => chunk_ref.path.clone(),
            };
            out.push((number, path));
        }
        out.sort_unstable_by_key(|(n, _)| *n);
        Ok(out)
    }
}

/// Parse a directory index document.
pub fn parse_directory_index(data: &[u8]) -> Result<DirectoryIndex> {
    serde_json::from_slice(data)
        .map_err(|e| Error::Parse(format!("invalid directory index: {e}")))
}
