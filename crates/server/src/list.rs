//! A served list: type semantics layered over a chunk source.

use crate::error::{ApiError, ApiResult};
use bouncer_core::{
    delta, ListClaim, ListConfig, ListPayload, ListType, ListUpdate,
};
use bouncer_source::{ChunkSource, SourceResult};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::time::Duration;

/// One served list instance. Version-qualified siblings are separate `List`
/// values sharing a base name but pointing at different origins.
#[derive(Debug)]
pub struct List {
    name: String,
    list_type: ListType,
    redirect_url: Option<String>,
    not_publishing_deltas: bool,
    source: ChunkSource,
}

impl List {
    /// Build a list over the given origin URL. `name` may be the base name or
    /// a version-qualified variant; the rest of the settings come from the
    /// list's configuration.
    pub fn new(
        name: String,
        source_url: &str,
        config: &ListConfig,
        default_interval: Duration,
    ) -> SourceResult<Self> {
        let interval = config
            .refresh_check_interval_secs
            .map_or(default_interval, Duration::from_secs);
        Ok(Self {
            name,
            list_type: config.list_type,
            redirect_url: config.redirect_url.clone(),
            not_publishing_deltas: config.not_publishing_deltas,
            source: ChunkSource::new(source_url, interval, config.list_type.allowed_hash_sizes())?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn list_type(&self) -> ListType {
        self.list_type
    }

    /// Refresh the underlying source. Used to warm a freshly built registry.
    pub async fn refresh(&self) -> SourceResult<()> {
        self.source.refresh().await
    }

    /// Compute this list's update section for one client claim.
    ///
    /// `public_name` is the name the client used (and will recognize in `i:`
    /// and redirect lines); for a version-qualified list it is the base name.
    /// Returns `None` when the client is already current.
    pub async fn build_update(
        &self,
        public_name: &str,
        claim: &ListClaim,
    ) -> ApiResult<Option<ListUpdate>> {
        let (current_adds, current_subs) = self.source.list_chunks().await?;

        let missing_adds = delta(&current_adds, &claim.adds);
        let missing_subs = delta(&current_subs, &claim.subs);

        // For a list that never publishes sub chunks, tell the client which
        // of its claimed chunks the server no longer carries.
        let (stale_adds, stale_subs) = if self.not_publishing_deltas {
            (delta(&claim.adds, &current_adds), delta(&claim.subs, &current_subs))
        } else {
            (Vec::new(), Vec::new())
        };

        if missing_adds.is_empty()
            && missing_subs.is_empty()
            && stale_adds.is_empty()
            && stale_subs.is_empty()
        {
            return Ok(None);
        }

        let payload = if self.list_type.serves_inline() {
            let adds: BTreeSet<u32> = missing_adds.iter().copied().collect();
            let subs: BTreeSet<u32> = missing_subs.iter().copied().collect();
            let (add_chunks, sub_chunks) = self.source.fetch(&adds, &subs).await?;
            ListPayload::Inline {
                adds: add_chunks,
                subs: sub_chunks,
            }
        } else {
            let base_url = self.redirect_url.clone().ok_or_else(|| {
                ApiError::Internal(format!("list \"{}\" has no redirect URL", self.name))
            })?;
            let mut chunk_numbers = missing_adds.clone();
            chunk_numbers.extend(&missing_subs);
            ListPayload::Redirect {
                base_url,
                chunk_numbers,
            }
        };

        Ok(Some(ListUpdate {
            name: public_name.to_string(),
            stale_adds,
            stale_subs,
            payload,
        }))
    }

    /// Full hashes starting with `prefix`, per chunk. Prefixes of the wrong
    /// size for this list type cannot match anything and return nothing.
    pub fn find_prefix(&self, prefix: &[u8]) -> Vec<(u32, Vec<Bytes>)> {
        if prefix.len() != self.list_type.prefix_size() {
            return Vec::new();
        }
        self.source.find_prefix(prefix)
    }
}
