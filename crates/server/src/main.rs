//! Bouncer server binary.

use anyhow::{Context, Result};
use bouncer_core::AppConfig;
use bouncer_server::{create_router, AppState, Registry};
use clap::Parser;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bouncer - a chunk-based blocklist distribution server
#[derive(Parser, Debug)]
#[command(name = "bouncerd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BOUNCER_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Bouncer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("BOUNCER_") && key != "BOUNCER_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: bouncerd --config /path/to/config.toml\n  \
             2. Environment variables: BOUNCER_SERVER__BIND=0.0.0.0:8080 bouncerd\n\n\
             See config/server.example.toml for example configuration.\n\
             Set BOUNCER_CONFIG env var to specify a default config file path."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("BOUNCER_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    // Build and warm the initial registry before accepting traffic so the
    // first clients are not all racing cold sources.
    let registry = Registry::build(&config).context("failed to build registry")?;
    registry.warm().await;
    tracing::info!(lists = registry.base_names().len(), "registry built");

    let state = AppState::new(config.clone(), registry);
    let _rebuild_handle = state.spawn_rebuild_task();
    tracing::info!(
        delay_secs = config.protocol.registry_rebuild_secs,
        "registry rebuild task spawned"
    );

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
