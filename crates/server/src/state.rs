//! Application state shared across handlers.

use crate::registry::Registry;
use arc_swap::ArcSwap;
use bouncer_core::AppConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared application state.
///
/// Handlers read an immutable registry snapshot; the rebuild task is the only
/// writer and publishes a complete replacement in one atomic swap, so
/// in-flight requests never observe a partially built registry.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    registry: Arc<ArcSwap<Registry>>,
}

impl AppState {
    pub fn new(config: AppConfig, registry: Registry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    /// The current registry snapshot.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.load_full()
    }

    /// Spawn the periodic registry rebuild task.
    ///
    /// A failed rebuild cycle is logged and skipped; the previous registry
    /// keeps serving until the next cycle succeeds.
    pub fn spawn_rebuild_task(&self) -> JoinHandle<()> {
        let state = self.clone();
        let delay = state.config.protocol.registry_rebuild_delay();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(delay).await;
                match Registry::build(&state.config) {
                    Ok(rebuilt) => {
                        rebuilt.warm().await;
                        state.registry.store(Arc::new(rebuilt));
                        info!("registry rebuilt");
                    }
                    Err(err) => {
                        error!(error = %err, "registry rebuild failed, keeping previous registry");
                    }
                }
            }
        })
    }
}
