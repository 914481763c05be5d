mod analytics;
mod api;
mod board;
mod config;
mod errors;
mod exchanges;
mod models;
mod poller;
mod tracker;

use api::ApiServer;
use board::SpreadBoard;
use config::{Config, LogFormat};
use exchanges::binance::Binance;
use poller::{Poller, PollerSettings};
use std::sync::Arc;
use tokio::sync::watch;
use tracker::DeltaTracker;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(config.log_format);

    tracing::info!(
        "spreadwatch starting: tracking top {} {} symbols on port {}",
        config.top_n,
        config.spread_quote_asset,
        config.port
    );

    // ── 1. Find a reachable endpoint (fatal if none) ──────────────
    let binance = match Binance::connect(&config).await {
        Ok(binance) => binance,
        Err(e) => {
            tracing::error!(error = %e, "no market data endpoint reachable, not serving");
            return Err(e.into());
        }
    };
    tracing::debug!(endpoint = binance.base_url(), "using market data endpoint");

    let board = SpreadBoard::new();
    let server = ApiServer::new(board.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── 2. Spawn the polling loop ─────────────────────────────────
    let poller = Poller::new(
        Arc::new(binance),
        Arc::new(board),
        DeltaTracker::with_ttl(config.tracker_ttl_cycles),
        PollerSettings::from(&config),
    );
    let poller_handle = tokio::spawn(poller.run(shutdown_rx.clone()));

    // ── 3. Flip the shutdown signal on Ctrl+C ─────────────────────
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Shutting down...");
        let _ = shutdown_tx.send(true);
    });

    // ── 4. Serve /metrics and the JSON views until shutdown ───────
    if let Err(e) = server.run(config.port, shutdown_rx).await {
        tracing::error!(error = %e, "unable to start server");
        poller_handle.abort();
        return Err(e);
    }

    if let Err(e) = poller_handle.await {
        tracing::warn!(error = %e, "poller task panicked");
    }

    Ok(())
}
