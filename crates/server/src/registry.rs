//! The registry of served lists.
//!
//! Built from configuration at startup and rebuilt on a periodic background
//! cycle; readers always see a complete registry via a single atomic swap in
//! [`crate::state::AppState`].

use crate::error::ApiResult;
use crate::list::List;
use bouncer_core::version::{match_versioned_list, versioned_name};
use bouncer_core::AppConfig;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Matching full hashes grouped list → chunk number → hashes.
pub type PrefixMatches = BTreeMap<String, BTreeMap<u32, Vec<Bytes>>>;

/// All lists this server currently serves, keyed by served name
/// (version-qualified variants included).
#[derive(Debug)]
pub struct Registry {
    interval_secs: u32,
    oldest_supported: Option<String>,
    serving: BTreeMap<String, Arc<List>>,
    /// Base name → supported version tags, for versioned resolution.
    versions: BTreeMap<String, BTreeSet<String>>,
    /// Sorted base names, what `/list` reports.
    base_names: Vec<String>,
}

impl Registry {
    /// Build a registry from configuration. Construction does no I/O; chunk
    /// data loads lazily on first use (or eagerly via [`Registry::warm`]).
    pub fn build(config: &AppConfig) -> ApiResult<Self> {
        config.validate()?;

        let default_interval =
            Duration::from_secs(config.protocol.refresh_check_interval_secs);
        let oldest_supported = config.protocol.oldest_supported_version.clone();

        let mut serving = BTreeMap::new();
        let mut versions: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut base_names = Vec::with_capacity(config.lists.len());

        for list_config in &config.lists {
            let base = &list_config.name;
            base_names.push(base.clone());
            serving.insert(
                base.clone(),
                Arc::new(List::new(
                    base.clone(),
                    &list_config.source,
                    list_config,
                    default_interval,
                )?),
            );

            if list_config.versions.is_empty() {
                continue;
            }

            let mut tags = BTreeSet::new();
            for tag in &list_config.versions {
                if !tag.starts_with(|c: char| c.is_ascii_digit()) {
                    warn!(list = %base, tag = %tag, "skipping malformed version tag");
                    continue;
                }
                tags.insert(tag.clone());
            }

            // The legacy floor is a pinned variant too, even when it is not
            // one of the advertised tags.
            let mut pinned = tags.clone();
            if let Some(floor) = &oldest_supported {
                pinned.insert(floor.clone());
            }

            for tag in &pinned {
                // validated: versioned lists always carry a template
                let Some(source) = list_config.source_for_version(tag) else {
                    continue;
                };
                serving.insert(
                    versioned_name(tag, base),
                    Arc::new(List::new(
                        versioned_name(tag, base),
                        &source,
                        list_config,
                        default_interval,
                    )?),
                );
            }
            versions.insert(base.clone(), tags);
        }

        base_names.sort_unstable();

        Ok(Self {
            interval_secs: config.protocol.default_interval_secs,
            oldest_supported,
            serving,
            versions,
            base_names,
        })
    }

    /// Poll-back interval advertised to clients.
    pub fn interval_secs(&self) -> u32 {
        self.interval_secs
    }

    /// Sorted base list names.
    pub fn base_names(&self) -> &[String] {
        &self.base_names
    }

    /// Resolve a claimed list name (applying version matching for lists with
    /// pinned variants) to the list instance that should serve it.
    pub fn resolve(&self, name: &str, client_version: Option<&str>) -> Option<Arc<List>> {
        let tags = match self.versions.get(name) {
            Some(tags) => tags,
            None => return self.serving.get(name).cloned(),
        };
        let (resolved, _) = match_versioned_list(
            client_version,
            tags,
            name,
            self.oldest_supported.as_deref(),
        );
        self.serving
            .get(&resolved)
            .or_else(|| self.serving.get(name))
            .cloned()
    }

    /// Look the prefixes up across every base list. Version-qualified
    /// variants are skipped: gethash responses must carry names the client
    /// subscribed to. Prefixes that match nothing are silently ignored.
    pub fn lookup_prefixes(&self, prefixes: &BTreeSet<Bytes>) -> PrefixMatches {
        let mut found: PrefixMatches = BTreeMap::new();
        for name in &self.base_names {
            let Some(list) = self.serving.get(name) else {
                continue;
            };
            for prefix in prefixes {
                for (chunk_number, hashes) in list.find_prefix(prefix) {
                    found
                        .entry(name.clone())
                        .or_default()
                        .entry(chunk_number)
                        .or_default()
                        .extend(hashes);
                }
            }
        }
        found
    }

    /// Eagerly refresh every served list, tolerating per-list failures so one
    /// broken origin never takes down the rest of the registry.
    pub async fn warm(&self) {
        for (name, list) in &self.serving {
            if let Err(err) = list.refresh().await {
                warn!(list = %name, error = %err, "initial load failed, serving empty list");
            }
        }
    }
}
