// =============================================================================
// Ticker Relay — Main Entry Point
// =============================================================================
//
// Serves `/history/:ticker` (upstream candles, normalised) and `/ws` (live
// ticker relay, one upstream feed per client) from a single axum server.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod coinbase;
mod error;
mod runtime_config;
mod types;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::RelayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Ticker Relay — starting up");

    let config_path =
        std::env::var("RELAY_CONFIG").unwrap_or_else(|_| "relay_config.json".into());
    let mut config = RelayConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RelayConfig::default()
    });
    config.apply_env_overrides();
    config.validate().context("invalid relay configuration")?;

    info!(
        products = ?config.product_ids,
        channels = ?config.channels,
        ws_url = %config.ws_url,
        rest_base_url = %config.rest_base_url,
        "Configured upstream"
    );

    // ── 2. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;

    // ── 3. Serve until Ctrl+C ────────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "Relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server failed")?;

    info!("Ticker Relay shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        return std::future::pending().await;
    }
    warn!("Shutdown signal received — stopping gracefully");
}
