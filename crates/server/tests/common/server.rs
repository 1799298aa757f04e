//! Server test utilities.

use bouncer_core::{AppConfig, ListConfig, ListType};
use bouncer_server::{create_router, AppState, Registry};
use tempfile::TempDir;

/// A test server wrapper with its backing chunk data on disk.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server. The modifier receives the temp dir path and the
    /// default config; it writes chunk files into the temp dir and registers
    /// lists pointing at them.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&std::path::Path, &mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let mut config = AppConfig::default();
        modifier(temp_dir.path(), &mut config);

        let registry = Registry::build(&config).expect("Failed to build registry");
        registry.warm().await;

        let state = AppState::new(config, registry);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            temp_dir,
        }
    }
}

/// A digest256 list config pointing at a file inside the test temp dir.
#[allow(dead_code)]
pub fn digest256_list(name: &str, base: &std::path::Path) -> ListConfig {
    ListConfig {
        name: name.to_string(),
        list_type: ListType::Digest256,
        source: base.join(name).display().to_string(),
        redirect_url: None,
        not_publishing_deltas: false,
        refresh_check_interval_secs: None,
        versions: Vec::new(),
        versioned_source: None,
    }
}

/// A shavar list config pointing at a file inside the test temp dir.
#[allow(dead_code)]
pub fn shavar_list(name: &str, base: &std::path::Path, redirect_url: &str) -> ListConfig {
    ListConfig {
        name: name.to_string(),
        list_type: ListType::Shavar,
        source: base.join(name).display().to_string(),
        redirect_url: Some(redirect_url.to_string()),
        not_publishing_deltas: false,
        refresh_check_interval_secs: None,
        versions: Vec::new(),
        versioned_source: None,
    }
}
