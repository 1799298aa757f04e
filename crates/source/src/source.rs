//! The cached, refresh-gated chunk source.

use crate::error::{SourceError, SourceResult};
use crate::origin::{ChangeToken, Origin};
use crate::s3::S3Handle;
use arc_swap::ArcSwap;
use bouncer_core::{Chunk, ChunkList};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Hard ceiling on a single origin fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Refresh bookkeeping, serialized behind a mutex so concurrent requests
/// trigger at most one origin fetch per staleness window.
#[derive(Debug, Default)]
struct RefreshState {
    last_check: Option<Instant>,
    token: Option<ChangeToken>,
    /// Whether any load has ever succeeded.
    loaded: bool,
}

/// A list's chunk data, cached in memory and refreshed from its origin.
///
/// Starts out holding an empty chunk set so the list can always be served;
/// a failed reload keeps the previous data authoritative. Readers take a
/// wait-free snapshot; only `refresh` takes the state lock.
#[derive(Debug)]
pub struct ChunkSource {
    origin: Origin,
    interval: Duration,
    allowed_hash_sizes: &'static [usize],
    state: Mutex<RefreshState>,
    chunks: ArcSwap<ChunkList>,
    s3: S3Handle,
}

impl ChunkSource {
    /// Build a source from its configured URL. Loaded chunk data must carry
    /// one of `allowed_hash_sizes`; anything else fails the load as a parse
    /// error. Construction fails only on a malformed URL; no I/O happens
    /// until the first refresh.
    pub fn new(
        url: &str,
        interval: Duration,
        allowed_hash_sizes: &'static [usize],
    ) -> SourceResult<Self> {
        Ok(Self {
            origin: Origin::parse(url)?,
            interval,
            allowed_hash_sizes,
            state: Mutex::new(RefreshState::default()),
            chunks: ArcSwap::from_pointee(ChunkList::new()),
            s3: S3Handle::new(),
        })
    }

    /// The origin location, for logs.
    pub fn location(&self) -> String {
        self.origin.describe()
    }

    /// Current chunk data snapshot. Never blocks.
    pub fn snapshot(&self) -> Arc<ChunkList> {
        self.chunks.load_full()
    }

    /// Bring the cached data up to date if the refresh interval has elapsed
    /// and the origin's change token moved.
    ///
    /// Idempotent within one interval: repeated calls perform no origin I/O.
    /// The check timestamp advances even when the subsequent load fails, so a
    /// broken origin is re-probed once per interval rather than per request.
    pub async fn refresh(&self) -> SourceResult<()> {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if let Some(last_check) = state.last_check {
            if now.duration_since(last_check) < self.interval {
                return Ok(());
            }
        }
        state.last_check = Some(now);

        let token = self
            .bounded(self.origin.change_token(&self.s3))
            .await?;
        if state.token.as_ref() == Some(&token) {
            debug!(origin = %self.origin.describe(), "origin unchanged, keeping cached chunks");
            return Ok(());
        }

        let loaded = self.bounded(self.origin.load(&self.s3)).await?;
        self.check_hash_sizes(&loaded)?;
        info!(
            origin = %self.origin.describe(),
            adds = loaded.add_numbers().len(),
            subs = loaded.sub_numbers().len(),
            "loaded chunk data"
        );
        self.chunks.store(Arc::new(loaded));
        state.token = Some(token);
        state.loaded = true;
        Ok(())
    }

    /// Refresh, degrading to the cached snapshot when the origin fails.
    ///
    /// A source that has loaded good data before keeps serving it through
    /// origin outages. A source that never had data serves its empty set when
    /// the origin reports no-data, and propagates anything else.
    async fn refresh_or_serve_cached(&self) -> SourceResult<()> {
        match self.refresh().await {
            Ok(()) => Ok(()),
            Err(err) => {
                let loaded = self.state.lock().await.loaded;
                match err {
                    _ if loaded => {
                        warn!(
                            origin = %self.origin.describe(),
                            error = %err,
                            "refresh failed, serving previous chunk data"
                        );
                        Ok(())
                    }
                    SourceError::NoData(location) => {
                        warn!(origin = %location, "no chunk data at origin yet");
                        Ok(())
                    }
                    other => Err(other),
                }
            }
        }
    }

    /// Current add and sub chunk numbers, refreshing first.
    pub async fn list_chunks(&self) -> SourceResult<(BTreeSet<u32>, BTreeSet<u32>)> {
        self.refresh_or_serve_cached().await?;
        let chunks = self.snapshot();
        Ok((chunks.add_numbers(), chunks.sub_numbers()))
    }

    /// Materialize the requested chunks, refreshing first. Requesting a chunk
    /// number the source does not have is an error.
    pub async fn fetch(
        &self,
        adds: &BTreeSet<u32>,
        subs: &BTreeSet<u32>,
    ) -> SourceResult<(Vec<Chunk>, Vec<Chunk>)> {
        self.refresh_or_serve_cached().await?;
        let chunks = self.snapshot();

        let mut out_adds = Vec::with_capacity(adds.len());
        for &number in adds {
            let chunk = chunks.add(number).ok_or(SourceError::UnknownChunk {
                kind: "add",
                number,
            })?;
            out_adds.push(chunk.clone());
        }
        let mut out_subs = Vec::with_capacity(subs.len());
        for &number in subs {
            let chunk = chunks.sub(number).ok_or(SourceError::UnknownChunk {
                kind: "sub",
                number,
            })?;
            out_subs.push(chunk.clone());
        }
        Ok((out_adds, out_subs))
    }

    /// All add chunks whose hash set contains an entry starting with `prefix`,
    /// from the current snapshot. Does not refresh.
    pub fn find_prefix(&self, prefix: &[u8]) -> Vec<(u32, Vec<Bytes>)> {
        self.snapshot()
            .find_prefix(prefix)
            .into_iter()
            .map(|chunk| (chunk.number(), chunk.hashes_with_prefix(prefix)))
            .collect()
    }

    /// Reject loaded data whose hash sizes the owning list cannot serve,
    /// before it replaces the cached snapshot.
    fn check_hash_sizes(&self, chunks: &ChunkList) -> SourceResult<()> {
        for chunk in chunks.chunks() {
            if !self.allowed_hash_sizes.contains(&chunk.hash_size()) {
                return Err(SourceError::Parse {
                    url: self.origin.describe(),
                    source: bouncer_core::Error::Parse(format!(
                        "chunk {} has hash size {}, allowed sizes are {:?}",
                        chunk.number(),
                        chunk.hash_size(),
                        self.allowed_hash_sizes
                    )),
                });
            }
        }
        Ok(())
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = SourceResult<T>>,
    ) -> SourceResult<T> {
        match tokio::time::timeout(FETCH_TIMEOUT, fut).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                url: self.origin.describe(),
                seconds: FETCH_TIMEOUT.as_secs(),
            }),
        }
    }
}
