//! Origin descriptors: where a list's chunk data physically lives.
//!
//! The URL scheme is resolved once at construction. Four origin shapes exist:
//! a single local chunk file, a local directory with an `index.json`, a single
//! S3 object, and an S3 "directory" keyed by an index object. Unknown schemes
//! are a configuration error surfaced at startup.

use crate::error::{SourceError, SourceResult};
use crate::s3::S3Handle;
use bouncer_core::{parse_chunk_file, parse_directory_index, Chunk, ChunkList};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const INDEX_NAME: &str = "index.json";

/// A chunk file this small cannot hold even one empty record; treat the list
/// as having no data rather than failing the parse.
const MIN_DATA_LEN: u64 = 3;

/// Staleness marker for an origin: local files are keyed by modification time
/// plus length (mtime alone has coarse granularity on some filesystems),
/// S3 objects by ETag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeToken {
    File { modified: SystemTime, len: u64 },
    ETag(String),
}

/// A parsed origin descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    /// A single local chunk file.
    File { path: PathBuf },
    /// A local directory; `index_path` names its `index.json`.
    Directory { index_path: PathBuf },
    /// A single S3 object holding a chunk file.
    S3File { bucket: String, key: String },
    /// An S3 prefix; `index_key` names its `index.json` object.
    S3Directory { bucket: String, index_key: String },
}

impl Origin {
    /// Parse a source URL into an origin.
    ///
    /// Accepted shapes: a bare path, `file:<path>`, `dir:<path>`,
    /// `s3+file://<bucket>/<key>`, `s3+dir://<bucket>/<prefix>`. Directory
    /// forms get `index.json` appended unless the URL already names it.
    pub fn parse(url: &str) -> SourceResult<Self> {
        if let Some(rest) = url.strip_prefix("s3+file://") {
            let (bucket, key) = split_bucket_key(url, rest)?;
            return Ok(Self::S3File { bucket, key });
        }
        if let Some(rest) = url.strip_prefix("s3+dir://") {
            let (bucket, key) = split_bucket_key(url, rest)?;
            return Ok(Self::S3Directory {
                bucket,
                index_key: join_index_key(&key),
            });
        }
        if let Some(rest) = url.strip_prefix("dir:") {
            let path = strip_slashes_prefix(rest);
            if path.is_empty() {
                return Err(SourceError::Config(format!("empty path in \"{url}\"")));
            }
            return Ok(Self::Directory {
                index_path: join_index_path(path),
            });
        }
        if let Some(rest) = url.strip_prefix("file:") {
            let path = strip_slashes_prefix(rest);
            if path.is_empty() {
                return Err(SourceError::Config(format!("empty path in \"{url}\"")));
            }
            return Ok(Self::File {
                path: PathBuf::from(path),
            });
        }
        if url.contains("://") {
            return Err(SourceError::Config(format!(
                "unknown source scheme in \"{url}\""
            )));
        }
        if url.is_empty() {
            return Err(SourceError::Config("empty source URL".to_string()));
        }
        Ok(Self::File {
            path: PathBuf::from(url),
        })
    }

    /// Human-readable origin location for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::File { path } => path.display().to_string(),
            Self::Directory { index_path } => index_path.display().to_string(),
            Self::S3File { bucket, key } => format!("s3://{bucket}/{key}"),
            Self::S3Directory { bucket, index_key } => format!("s3://{bucket}/{index_key}"),
        }
    }

    /// The origin's current change token. Missing origins are no-data.
    pub async fn change_token(&self, s3: &S3Handle) -> SourceResult<ChangeToken> {
        match self {
            Self::File { path } | Self::Directory { index_path: path } => {
                let meta = tokio::fs::metadata(path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        SourceError::NoData(path.display().to_string())
                    } else {
                        SourceError::Io(e)
                    }
                })?;
                Ok(ChangeToken::File {
                    modified: meta.modified()?,
                    len: meta.len(),
                })
            }
            Self::S3File { bucket, key } | Self::S3Directory { bucket, index_key: key } => {
                Ok(ChangeToken::ETag(s3.etag(bucket, key).await?))
            }
        }
    }

    /// Fetch and parse the origin's current chunk data.
    pub async fn load(&self, s3: &S3Handle) -> SourceResult<ChunkList> {
        match self {
            Self::File { path } => {
                let data = read_local(path).await?;
                parse_chunk_file(&data).map_err(|e| self.parse_error(e))
            }
            Self::Directory { index_path } => {
                let index_data = read_local(index_path).await?;
                let index =
                    parse_directory_index(&index_data).map_err(|e| self.parse_error(e))?;
                let base = index_path.parent().unwrap_or(Path::new(""));

                let mut chunks = ChunkList::new();
                for (number, rel_path) in index.entries().map_err(|e| self.parse_error(e))? {
                    let path = base.join(&rel_path);
                    let data = tokio::fs::read(&path).await.map_err(|e| {
                        if e.kind() == std::io::ErrorKind::NotFound {
                            self.missing_member(&rel_path)
                        } else {
                            SourceError::Io(e)
                        }
                    })?;
                    self.insert_member(&mut chunks, number, &rel_path, Bytes::from(data))?;
                }
                Ok(chunks)
            }
            Self::S3File { bucket, key } => {
                let data = s3.get(bucket, key).await?;
                if (data.len() as u64) < MIN_DATA_LEN {
                    return Err(SourceError::NoData(self.describe()));
                }
                parse_chunk_file(&data).map_err(|e| self.parse_error(e))
            }
            Self::S3Directory { bucket, index_key } => {
                let index_data = s3.get(bucket, index_key).await?;
                let index =
                    parse_directory_index(&index_data).map_err(|e| self.parse_error(e))?;
                let base = key_dirname(index_key);

                let mut chunks = ChunkList::new();
                for (number, rel_path) in index.entries().map_err(|e| self.parse_error(e))? {
                    let key = if base.is_empty() {
                        rel_path.clone()
                    } else {
                        format!("{base}/{rel_path}")
                    };
                    let data = match s3.get(bucket, &key).await {
                        Err(SourceError::NoData(_)) => {
                            return Err(self.missing_member(&rel_path))
                        }
                        other => other?,
                    };
                    self.insert_member(&mut chunks, number, &rel_path, data)?;
                }
                Ok(chunks)
            }
        }
    }

    /// Parse one index-referenced chunk file and fold it into `chunks`.
    /// Each file must hold exactly the chunk the index says it does.
    fn insert_member(
        &self,
        chunks: &mut ChunkList,
        number: u32,
        rel_path: &str,
        data: Bytes,
    ) -> SourceResult<()> {
        let parsed = parse_chunk_file(&data).map_err(|e| self.parse_error(e))?;
        if parsed.len() != 1 {
            return Err(self.parse_error(bouncer_core::Error::Parse(format!(
                "chunk file \"{rel_path}\" holds {} chunks, expected exactly 1",
                parsed.len()
            ))));
        }
        let chunk: Chunk = parsed
            .add(number)
            .or_else(|| parsed.sub(number))
            .cloned()
            .ok_or_else(|| {
                self.parse_error(bouncer_core::Error::Parse(format!(
                    "chunk file \"{rel_path}\" does not contain chunk {number}"
                )))
            })?;
        chunks.insert(chunk).map_err(|e| self.parse_error(e))
    }

    fn parse_error(&self, source: bouncer_core::Error) -> SourceError {
        SourceError::Parse {
            url: self.describe(),
            source,
        }
    }

    fn missing_member(&self, rel_path: &str) -> SourceError {
        self.parse_error(bouncer_core::Error::Parse(format!(
            "index references missing chunk file \"{rel_path}\""
        )))
    }
}

/// Read a local chunk or index file, mapping absence and near-empty content
/// to the no-data condition.
async fn read_local(path: &Path) -> SourceResult<Bytes> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SourceError::NoData(path.display().to_string())
        } else {
            SourceError::Io(e)
        }
    })?;
    if (data.len() as u64) < MIN_DATA_LEN {
        return Err(SourceError::NoData(path.display().to_string()));
    }
    Ok(Bytes::from(data))
}

fn split_bucket_key(url: &str, rest: &str) -> SourceResult<(String, String)> {
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.trim_start_matches('/').is_empty() => {
            Ok((bucket.to_string(), key.trim_start_matches('/').to_string()))
        }
        _ => Err(SourceError::Config(format!(
            "S3 source \"{url}\" must name a bucket and key"
        ))),
    }
}

fn strip_slashes_prefix(rest: &str) -> &str {
    // `scheme://host/path` shapes collapse to the path: a local origin has no
    // host, so `dir:///srv/x` and `dir:/srv/x` both mean /srv/x.
    if let Some(stripped) = rest.strip_prefix("//") {
        stripped
    } else {
        rest
    }
}

fn join_index_path(path: &str) -> PathBuf {
    if path.ends_with(INDEX_NAME) {
        PathBuf::from(path)
    } else {
        Path::new(path.trim_end_matches('/')).join(INDEX_NAME)
    }
}

fn join_index_key(key: &str) -> String {
    if key.ends_with(INDEX_NAME) {
        key.to_string()
    } else {
        format!("{}/{}", key.trim_end_matches('/'), INDEX_NAME)
    }
}

fn key_dirname(key: &str) -> &str {
    key.rsplit_once('/').map_or("", |(dir, _)| dir)
}
