//! Live Binance source
//!
//! Connects the combined streams, seeds the book from the REST snapshot and
//! applies incremental updates. Any failure clears the connection flag and
//! the session reconnects after a fixed delay until cancelled.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::WebSocketClient;
use crate::config::Config;
use crate::error::{FeedError, Result};
use crate::feed::session::SessionState;
use crate::monitoring::FeedMetrics;
use crate::orderbook::UpdateOutcome;
use crate::parser::{OrderBookSnapshot, ParsedMessage};

/// Silence after which the connection is probed with a ping. A second
/// silent period after the ping is a connection timeout.
const RECV_TIMEOUT: Duration = Duration::from_secs(45);

/// Streams one symbol from Binance into a session
pub(crate) struct LiveSource {
    config: Arc<Config>,
    client: WebSocketClient,
    http: reqwest::Client,
    session: SessionState,
    metrics: FeedMetrics,
}

impl LiveSource {
    pub(crate) fn new(config: Arc<Config>, session: SessionState, metrics: FeedMetrics) -> Self {
        let client = WebSocketClient::new(&config.ws_endpoint, session.symbol());

        Self {
            config,
            client,
            http: reqwest::Client::new(),
            session,
            metrics,
        }
    }

    /// Run until cancelled, reconnecting after a fixed delay on any failure
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        info!(symbol = %self.session.symbol(), "Starting live source");

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.connect_and_process() => result,
            };

            self.session.set_connected(false);
            self.client.close().await;

            match result {
                Ok(()) => info!("Live stream completed, reconnecting"),
                Err(e) => error!(error = %e, symbol = %self.session.symbol(), "Live stream error"),
            }

            warn!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
            self.metrics.reconnects.inc();
        }

        self.client.close().await;
        self.session.set_connected(false);
        info!(symbol = %self.session.symbol(), "Live source stopped");
    }

    /// Connect, seed the book and process messages until the connection fails
    async fn connect_and_process(&mut self) -> Result<()> {
        self.client.connect().await?;

        // Updates that arrive while the snapshot is in flight queue up on the
        // socket and are reconciled against it afterwards.
        let snapshot = self.fetch_snapshot().await?;
        self.session
            .apply_snapshot(&snapshot, chrono::Utc::now().timestamp_millis() as u64);
        self.session.set_connected(true);
        info!(
            symbol = %self.session.symbol(),
            last_update_id = snapshot.last_update_id,
            "Order book initialized"
        );

        let mut last_message = Instant::now();
        let mut ping_outstanding = false;

        loop {
            match timeout(RECV_TIMEOUT, self.client.recv()).await {
                Ok(Ok(message)) => {
                    // Any frame, pongs included, proves the peer is alive
                    last_message = Instant::now();
                    ping_outstanding = false;
                    if let Some(text) = message {
                        self.process_message(&text)?;
                    }
                }
                Ok(Err(e)) => return Err(e),
                Err(_) if ping_outstanding => {
                    warn!(
                        last_message_secs = last_message.elapsed().as_secs(),
                        "No reply to keepalive ping, reconnecting"
                    );
                    return Err(FeedError::ConnectionTimeout);
                }
                Err(_) => {
                    warn!(
                        last_message_secs = last_message.elapsed().as_secs(),
                        "No message received within timeout, sending keepalive"
                    );
                    if let Err(e) = self.client.ping().await {
                        warn!(error = %e, "Failed to send keepalive ping, reconnecting");
                        return Err(FeedError::ConnectionTimeout);
                    }
                    ping_outstanding = true;
                }
            }
        }
    }

    /// Fetch the order book snapshot from the REST API
    async fn fetch_snapshot(&self) -> Result<OrderBookSnapshot> {
        let url = format!(
            "{}/depth",
            self.config.rest_endpoint.trim_end_matches('/')
        );
        let limit = self.config.depth_levels.to_string();
        debug!(symbol = %self.session.symbol(), url = %url, "Fetching order book snapshot");

        let snapshot = self
            .http
            .get(&url)
            .query(&[("symbol", self.session.symbol()), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<OrderBookSnapshot>()
            .await?;

        Ok(snapshot)
    }

    /// Apply a single message. Unparseable messages are dropped; a sequence gap is an error.
    fn process_message(&mut self, raw: &str) -> Result<()> {
        let parsed = match ParsedMessage::parse(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!(error = %e, "Dropping unparseable message");
                self.metrics.dropped_messages.inc();
                return Ok(());
            }
        };
        self.metrics.record_message(parsed.kind());

        if let Some(symbol) = parsed.symbol() {
            if symbol != self.session.symbol() {
                trace!(symbol = %symbol, "Ignoring message for another symbol");
                return Ok(());
            }
        }

        match parsed {
            ParsedMessage::DepthUpdate(update) => match self.session.apply_depth(&update) {
                UpdateOutcome::Applied | UpdateOutcome::Stale | UpdateOutcome::Uninitialized => {}
                UpdateOutcome::Gap { expected, got } => {
                    self.metrics.sequence_gaps.inc();
                    return Err(FeedError::SequenceGap { expected, got });
                }
            },
            ParsedMessage::Trade(event) => {
                trace!(
                    symbol = %event.symbol,
                    price = %event.price,
                    qty = %event.quantity,
                    "Trade received"
                );
                self.session.record_trade(event.to_trade());
            }
            ParsedMessage::Ticker(ticker) => self.session.apply_ticker(&ticker),
            ParsedMessage::Unknown(msg) => {
                trace!(msg = %msg, "Unknown message type");
            }
        }

        Ok(())
    }
}
