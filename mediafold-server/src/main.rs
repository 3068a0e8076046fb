//! # mediafold server
//!
//! Serves browsable folders of images and videos over HTTP, with cached
//! video thumbnails and on-demand conversion of legacy video containers.
//!
//! Configuration comes from `mediafold.toml`, `.env` and environment
//! variables (see `mediafold-config`); the flags below override the loaded
//! values.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mediafold_config::{ConfigLoad, ConfigLoader};
use mediafold_server::{build_state, create_app, infra::startup::shutdown_signal};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "mediafold-server")]
#[command(about = "Media folder browser with cached thumbnails and streaming conversions")]
struct Cli {
    /// Path to a mediafold.toml file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Root of the media tree (overrides config)
    #[arg(long)]
    media_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config.clone() {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = cli.env_file.clone() {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host.clone() {
        config.server.host = host;
    }
    if let Some(root) = cli.media_root.clone() {
        config.media.root = root;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mediafold_server=info,mediafold_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "loaded configuration file");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    info!(
        media_root = %config.media_root().display(),
        scratch = %config.scratch_dir().display(),
        thumbnail_workers = config.thumbnails.workers,
        conversion_strategy = %config.conversion.strategy,
        "starting mediafold server"
    );

    let host = config.server.host.clone();
    let port = config.server.port;

    let state = build_state(config).await?;
    let app = create_app(state.clone());

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    info!("server stopped");
    Ok(())
}
