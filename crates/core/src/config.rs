//! Configuration types shared across crates.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable request tracing.
    #[serde(default)]
    pub enable_tracing: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            enable_tracing: false,
        }
    }
}

/// Protocol-level settings shared by all lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Client poll-back interval advertised in every downloads response
    /// (the `n:` line), in seconds.
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u32,
    /// How long a source considers its cached data fresh before re-checking
    /// the origin, in seconds.
    #[serde(default = "default_refresh_check_interval_secs")]
    pub refresh_check_interval_secs: u64,
    /// Delay between background registry rebuilds, in seconds.
    #[serde(default = "default_registry_rebuild_secs")]
    pub registry_rebuild_secs: u64,
    /// Clients at or below this major release collapse onto the variant
    /// pinned to this version. Unset disables the legacy floor.
    #[serde(default)]
    pub oldest_supported_version: Option<String>,
}

fn default_interval_secs() -> u32 {
    2700 // 45 minutes
}

fn default_refresh_check_interval_secs() -> u64 {
    600
}

fn default_registry_rebuild_secs() -> u64 {
    600
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: default_interval_secs(),
            refresh_check_interval_secs: default_refresh_check_interval_secs(),
            registry_rebuild_secs: default_registry_rebuild_secs(),
            oldest_supported_version: None,
        }
    }
}

impl ProtocolConfig {
    /// Get the refresh check interval as a Duration.
    pub fn refresh_check_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_check_interval_secs)
    }

    /// Get the registry rebuild delay as a Duration.
    pub fn registry_rebuild_delay(&self) -> Duration {
        Duration::from_secs(self.registry_rebuild_secs)
    }
}

/// The two served list flavors.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    /// Full 32-byte hashes, served inline in the downloads response.
    Digest256,
    /// 4-byte hash prefixes, served via redirect pointers to chunk content.
    Shavar,
}

impl ListType {
    /// Lookup key length for `findPrefix` on this list type.
    pub fn prefix_size(self) -> usize {
        match self {
            Self::Digest256 => crate::DIGEST_SIZE,
            Self::Shavar => crate::PREFIX_SIZE,
        }
    }

    /// Whether chunk content is embedded in the downloads response body.
    /// Shavar lists hand out redirect lines instead.
    pub fn serves_inline(self) -> bool {
        matches!(self, Self::Digest256)
    }

    /// Hash sizes chunk data for this list type may carry.
    ///
    /// Digest256 data is always full hashes. Shavar data may be 4-byte
    /// prefixes or the 32-byte full hashes gethash serves. Anything else
    /// fails the load as a parse error.
    pub fn allowed_hash_sizes(self) -> &'static [usize] {
        match self {
            Self::Digest256 => &[crate::DIGEST_SIZE],
            Self::Shavar => &[crate::PREFIX_SIZE, crate::DIGEST_SIZE],
        }
    }
}

/// One served list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListConfig {
    /// Base list name, e.g. "mozpub-track-digest256".
    pub name: String,
    #[serde(rename = "type")]
    pub list_type: ListType,
    /// Source URL: bare path or `file:` for a local chunk file, `dir:` for a
    /// local directory index, `s3+file:` / `s3+dir:` for the S3 equivalents.
    pub source: String,
    /// Base URL for `u:` redirect lines. Required for shavar lists.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// When set, downloads responses report the client's stale chunk claims
    /// (`ad:`/`sd:` lines) instead of relying on sub-chunk deltas.
    #[serde(default)]
    pub not_publishing_deltas: bool,
    /// Per-list override of the global refresh check interval.
    #[serde(default)]
    pub refresh_check_interval_secs: Option<u64>,
    /// Client release branches this list has pinned variants for.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Source URL template for version variants; `{version}` is substituted.
    /// Required when `versions` is non-empty.
    #[serde(default)]
    pub versioned_source: Option<String>,
}

impl ListConfig {
    /// The source URL for one version variant.
    pub fn source_for_version(&self, version: &str) -> Option<String> {
        self.versioned_source
            .as_ref()
            .map(|template| template.replace("{version}", version))
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("list name must not be empty".to_string()));
        }
        if self.source.is_empty() {
            return Err(Error::Config(format!(
                "list \"{}\" has an empty source",
                self.name
            )));
        }
        if self.list_type == ListType::Shavar && self.redirect_url.is_none() {
            return Err(Error::Config(format!(
                "shavar list \"{}\" requires a redirect_url",
                self.name
            )));
        }
        if self.refresh_check_interval_secs == Some(0) {
            return Err(Error::Config(format!(
                "list \"{}\" has a zero refresh interval",
                self.name
            )));
        }
        if !self.versions.is_empty() {
            match &self.versioned_source {
                Some(template) if template.contains("{version}") => {}
                Some(_) => {
                    return Err(Error::Config(format!(
                        "versioned_source for \"{}\" must contain a {{version}} placeholder",
                        self.name
                    )));
                }
                None => {
                    return Err(Error::Config(format!(
                        "list \"{}\" declares versions but no versioned_source",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// The lists this server distributes.
    #[serde(default)]
    pub lists: Vec<ListConfig>,
}

impl AppConfig {
    /// Validate configuration invariants. Called once at startup and again
    /// before every registry rebuild.
    pub fn validate(&self) -> Result<()> {
        if self.lists.is_empty() {
            return Err(Error::Config(
                "at least one list must be configured".to_string(),
            ));
        }
        if self.protocol.default_interval_secs == 0 {
            return Err(Error::Config(
                "protocol.default_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.protocol.refresh_check_interval_secs == 0 {
            return Err(Error::Config(
                "protocol.refresh_check_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.protocol.registry_rebuild_secs == 0 {
            return Err(Error::Config(
                "protocol.registry_rebuild_secs must be non-zero".to_string(),
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for list in &self.lists {
            list.validate()?;
            if !seen.insert(&list.name) {
                return Err(Error::Config(format!(
                    "duplicate list name \"{}\"",
                    list.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_list(name: &str) -> ListConfig {
        ListConfig {
            name: name.to_string(),
            list_type: ListType::Digest256,
            source: "/data/chunks".to_string(),
            redirect_url: None,
            not_publishing_deltas: false,
            refresh_check_interval_secs: None,
            versions: Vec::new(),
            versioned_source: None,
        }
    }

    #[test]
    fn test_validate_requires_lists() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_shavar_requires_redirect() {
        let mut list = digest_list("moz-abp-shavar");
        list.list_type = ListType::Shavar;
        let config = AppConfig {
            lists: vec![list],
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("redirect_url"));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let config = AppConfig {
            lists: vec![digest_list("a-digest256"), digest_list("a-digest256")],
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_versioned_list_needs_template() {
        let mut list = digest_list("pub-digest256");
        list.versions = vec!["70.0".to_string()];
        let config = AppConfig {
            lists: vec![list.clone()],
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        list.versioned_source = Some("/data/{version}/chunks".to_string());
        let config = AppConfig {
            lists: vec![list.clone()],
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(
            list.source_for_version("70.0").as_deref(),
            Some("/data/70.0/chunks")
        );
    }

    #[test]
    fn test_toml_shape() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0:9090"

            [protocol]
            default_interval_secs = 1800

            [[lists]]
            name = "mozpub-track-digest256"
            type = "digest256"
            source = "/srv/shavar/mozpub-track-digest256"

            [[lists]]
            name = "moz-abp-shavar"
            type = "shavar"
            source = "dir:/srv/shavar/moz-abp-shavar"
            redirect_url = "https://tracking.services.mozilla.com"
            not_publishing_deltas = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9090");
        assert_eq!(config.protocol.default_interval_secs, 1800);
        assert_eq!(config.protocol.refresh_check_interval_secs, 600);
        assert_eq!(config.lists.len(), 2);
        assert_eq!(config.lists[1].list_type, ListType::Shavar);
        assert!(config.lists[1].not_publishing_deltas);
        config.validate().unwrap();
    }
}
