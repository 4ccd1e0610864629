//! HTTP relay binary.
//!
//! Loads `RelayConfig` from `$VOXRELAY_CONFIG` or the default config path,
//! applies environment overrides and serves until Ctrl-C.
//! Tracing output goes to stderr.

use std::path::PathBuf;

use voxrelay::config::RelayConfig;
use voxrelay::server::{AppState, RelayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = std::env::var_os("VOXRELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(RelayConfig::default_config_path);
    let config = RelayConfig::load(&path)
        .map_err(|e| anyhow::anyhow!("failed to load config from {}: {e}", path.display()))?;
    tracing::info!(config = ?config, "voxrelay starting");

    if config.gateway.require_api_key().is_err() {
        tracing::warn!("GROQ_API_KEY is not set; completion, transcription and embedding requests will fail");
    }
    if config.speech.require_api_key().is_err() {
        tracing::warn!("ELEVENLABS_API_KEY is not set; speech requests will fail");
    }

    let state = AppState::from_config(&config);
    let server = RelayServer::start(state, &config.server).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    server.shutdown().await;

    tracing::info!("voxrelay shut down cleanly");
    Ok(())
}
