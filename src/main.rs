//! Depth Feed - Market Data Service
//!
//! Runs the market data feed for the configured selection and serves its
//! state over HTTP for dashboard screens.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use depth_feed::{server, AppState, Config, FeedMetrics, MarketDataFeed, MarketView};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting Depth Feed");

    let config = Arc::new(Config::load()?);
    info!(selection = %config.initial_selection(), "Configuration loaded");

    let metrics = FeedMetrics::new()?;
    let feed = MarketDataFeed::new(config.clone(), metrics.clone());
    let handle = feed.spawn();

    let status_view = handle.view().clone();
    let status_period = Duration::from_secs(config.status_log_interval_secs.max(1));
    tokio::spawn(log_status(status_view, status_period));

    let state = Arc::new(AppState {
        feed: handle.clone(),
        metrics,
    });
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            warn!(error = %e, "HTTP server error");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown().await?;

    Ok(())
}

/// Periodically log the book and summary of the active selection
async fn log_status(view: MarketView, period: Duration) {
    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        let book = view.order_book();
        let summary = view.summary();
        info!(
            selection = %view.selection(),
            connected = view.is_connected(),
            mid_price = ?book.metrics.mid_price,
            spread_bps = ?book.metrics.spread_bps,
            last_price = ?summary.as_ref().map(|s| s.last_price),
            change_percent = ?summary.as_ref().map(|s| s.change_percent),
            trades = view.trades().len(),
            "Feed status"
        );
    }
}
