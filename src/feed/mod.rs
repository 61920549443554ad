//! Market data feed
//!
//! Keeps exactly one active data source for the current selection. A
//! selection change tears the old source down (cancel, then await the task)
//! before the state is reset and the new source is spawned, so the active
//! task is always the only writer.

mod demo_source;
pub(crate) mod session;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::demo::DemoGenerator;
use crate::error::{FeedError, Result};
use crate::market::{AssetClass, MarketSelection, Provider, SelectionChange};
use crate::monitoring::FeedMetrics;
use crate::state::{FeedChannels, MarketView};
use crate::websocket::LiveSource;
use demo_source::DemoSource;
use session::SessionState;

const COMMAND_BUFFER: usize = 32;

/// Commands accepted by a spawned feed
#[derive(Debug)]
pub enum FeedCommand {
    Change(SelectionChange, oneshot::Sender<MarketSelection>),
    Shutdown(oneshot::Sender<()>),
}

struct ActiveSource {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the selection and the single active source
pub struct MarketDataFeed {
    config: Arc<Config>,
    channels: Arc<FeedChannels>,
    metrics: FeedMetrics,
    selection: MarketSelection,
    active: Option<ActiveSource>,
}

impl MarketDataFeed {
    pub fn new(config: Arc<Config>, metrics: FeedMetrics) -> Self {
        let selection = config.initial_selection();
        Self {
            channels: Arc::new(FeedChannels::new(selection.clone())),
            config,
            metrics,
            selection,
            active: None,
        }
    }

    pub fn view(&self) -> MarketView {
        self.channels.view()
    }

    pub fn selection(&self) -> &MarketSelection {
        &self.selection
    }

    pub fn metrics(&self) -> &FeedMetrics {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Establish the source for the current selection if none is running
    pub async fn start(&mut self) {
        if self.active.is_none() {
            self.establish();
        }
    }

    /// Switch to `selection`. Unsupported providers resolve to demo; an
    /// unchanged selection keeps the running source.
    pub async fn select(&mut self, selection: MarketSelection) -> &MarketSelection {
        let selection = selection.resolved();
        if selection == self.selection && self.active.is_some() {
            debug!(selection = %selection, "Selection unchanged");
            return &self.selection;
        }

        self.teardown().await;
        self.selection = selection;
        self.establish();
        &self.selection
    }

    pub async fn apply(&mut self, change: &SelectionChange) -> MarketSelection {
        let next = change.apply_to(&self.selection);
        self.select(next).await.clone()
    }

    pub async fn set_symbol(&mut self, symbol: &str) -> MarketSelection {
        self.apply(&SelectionChange::symbol(symbol)).await
    }

    /// Switching to another asset class also resets the provider to demo and
    /// selects that class's default symbol
    pub async fn set_asset_class(&mut self, asset_class: AssetClass) -> MarketSelection {
        self.apply(&SelectionChange::asset_class(asset_class)).await
    }

    pub async fn set_provider(&mut self, provider: Provider) -> MarketSelection {
        self.apply(&SelectionChange::provider(provider)).await
    }

    /// Stop the active source
    pub async fn shutdown(&mut self) {
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancel.cancel();
        if let Err(e) = active.task.await {
            warn!(error = %e, selection = %self.selection, "Data source task failed");
        }
        self.channels.publish_connected(false);
        self.metrics.connected.set(0);
        debug!(selection = %self.selection, "Data source torn down");
    }

    fn establish(&mut self) {
        self.channels.reset(self.selection.clone());

        let session = SessionState::new(
            &self.selection,
            self.config.depth_levels,
            self.channels.clone(),
            self.metrics.clone(),
        );
        let cancel = CancellationToken::new();

        let task = match self.selection.provider {
            Provider::Demo => {
                let generator = DemoGenerator::new(&self.selection, self.config.demo_seed);
                let source = DemoSource::new(
                    generator,
                    session,
                    Duration::from_millis(self.config.demo_interval_ms),
                    self.metrics.clone(),
                );
                tokio::spawn(source.run(cancel.clone()))
            }
            Provider::Binance => {
                let source = LiveSource::new(self.config.clone(), session, self.metrics.clone());
                tokio::spawn(source.run(cancel.clone()))
            }
        };

        self.metrics.source_switches.inc();
        info!(selection = %self.selection, "Data source established");
        self.active = Some(ActiveSource { cancel, task });
    }

    /// Start the feed on its own task and return a handle for issuing commands
    pub fn spawn(self) -> FeedHandle {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let view = self.view();
        tokio::spawn(self.run(receiver));
        FeedHandle { commands, view }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<FeedCommand>) {
        self.start().await;

        while let Some(command) = commands.recv().await {
            match command {
                FeedCommand::Change(change, reply) => {
                    let selection = self.apply(&change).await;
                    let _ = reply.send(selection);
                }
                FeedCommand::Shutdown(reply) => {
                    self.shutdown().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }

        // Every handle was dropped
        self.shutdown().await;
    }
}

/// Cloneable handle to a spawned [`MarketDataFeed`]
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    view: MarketView,
}

impl FeedHandle {
    pub fn view(&self) -> &MarketView {
        &self.view
    }

    /// Apply a selection change and return the resulting selection
    pub async fn change(&self, change: SelectionChange) -> Result<MarketSelection> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(FeedCommand::Change(change, reply))
            .await
            .map_err(|_| FeedError::FeedClosed)?;
        response.await.map_err(|_| FeedError::FeedClosed)
    }

    pub async fn set_symbol(&self, symbol: &str) -> Result<MarketSelection> {
        self.change(SelectionChange::symbol(symbol)).await
    }

    pub async fn set_asset_class(&self, asset_class: AssetClass) -> Result<MarketSelection> {
        self.change(SelectionChange::asset_class(asset_class)).await
    }

    /// Select a provider by name. Unknown or unsupported names select demo.
    pub async fn set_provider(&self, name: &str) -> Result<MarketSelection> {
        self.change(SelectionChange {
            provider: Some(name.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Tear down the active source and stop the feed
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(FeedCommand::Shutdown(reply))
            .await
            .map_err(|_| FeedError::FeedClosed)?;
        response.await.map_err(|_| FeedError::FeedClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::time::sleep;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            demo_seed: Some(7),
            demo_interval_ms: 1000,
            ..Config::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_source_publishes_ticks() {
        let mut feed = MarketDataFeed::new(test_config(), FeedMetrics::new().unwrap());
        let view = feed.view();
        feed.start().await;

        sleep(Duration::from_millis(3500)).await;

        assert!(view.is_connected());
        let trades = view.trades();
        assert!(trades.len() >= 3);
        assert!(trades.windows(2).all(|w| w[0].id > w[1].id));

        let book = view.order_book();
        assert_eq!(book.symbol, "BTCUSDT");
        assert!(book.metrics.is_healthy());
        assert!(view.summary().is_some());

        feed.shutdown().await;
        assert!(!view.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_asset_class_switch_replaces_state() {
        let mut feed = MarketDataFeed::new(test_config(), FeedMetrics::new().unwrap());
        let view = feed.view();
        feed.start().await;
        sleep(Duration::from_millis(2500)).await;
        assert!(!view.trades().is_empty());

        let selection = feed.set_asset_class(AssetClass::Stock).await;
        assert_eq!(selection, MarketSelection::for_asset_class(AssetClass::Stock));
        assert_eq!(view.selection(), selection);
        assert_eq!(view.order_book().symbol, "AAPL");

        sleep(Duration::from_millis(1500)).await;
        let trades = view.trades();
        assert_eq!(trades.last().map(|t| t.id), Some(1));
        assert!(trades.iter().all(|t| t.price > dec!(150) && t.price < dec!(250)));
        assert_eq!(view.summary().map(|s| s.symbol), Some("AAPL".to_string()));

        feed.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_provider_keeps_demo_source() {
        let config = Arc::new(Config {
            asset_class: AssetClass::Stock,
            symbol: "MSFT".to_string(),
            ..(*test_config()).clone()
        });
        let mut feed = MarketDataFeed::new(config, FeedMetrics::new().unwrap());
        feed.start().await;
        assert_eq!(feed.metrics().source_switches.get(), 1);

        let selection = feed.set_provider(Provider::Binance).await;
        assert_eq!(selection.provider, Provider::Demo);
        assert_eq!(selection.symbol, "MSFT");
        // Same selection after fallback: the running source is kept
        assert_eq!(feed.metrics().source_switches.get(), 1);

        let selection = feed.set_symbol("nvda").await;
        assert_eq!(selection.symbol, "NVDA");
        assert_eq!(feed.metrics().source_switches.get(), 2);
        assert!(feed.is_running());

        feed.shutdown().await;
        assert!(!feed.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_and_depth_still_produce_data() {
        let config = Arc::new(Config {
            demo_interval_ms: 0,
            depth_levels: 0,
            ..(*test_config()).clone()
        });
        let mut feed = MarketDataFeed::new(config, FeedMetrics::new().unwrap());
        let view = feed.view();
        feed.start().await;

        sleep(Duration::from_millis(100)).await;

        let active = feed.active.as_ref().unwrap();
        assert!(!active.task.is_finished());
        assert!(view.is_connected());
        assert!(!view.trades().is_empty());
        let book = view.order_book();
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.asks.len(), 1);

        feed.shutdown().await;
        assert!(!view.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_commands() {
        let feed = MarketDataFeed::new(test_config(), FeedMetrics::new().unwrap());
        let handle = feed.spawn();

        let selection = handle.set_symbol("ethusdt").await.unwrap();
        assert_eq!(selection.symbol, "ETHUSDT");
        assert_eq!(selection.provider, Provider::Demo);

        let selection = handle.set_provider("not-a-provider").await.unwrap();
        assert_eq!(selection.provider, Provider::Demo);

        sleep(Duration::from_millis(1500)).await;
        assert!(handle.view().is_connected());
        assert_eq!(handle.view().order_book().symbol, "ETHUSDT");

        handle.shutdown().await.unwrap();
        assert!(!handle.view().is_connected());
        assert!(matches!(
            handle.set_symbol("BTCUSDT").await,
            Err(FeedError::FeedClosed)
        ));
    }
}
