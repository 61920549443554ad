//! Observable feed state
//!
//! The active source is the only writer. Consumers hold a [`MarketView`],
//! which only exposes `watch` receivers and cloned snapshots.

use tokio::sync::watch;

use crate::market::MarketSelection;
use crate::orderbook::{DepthCurve, OrderBookState};
use crate::summary::MarketSummary;
use crate::trades::Trade;

/// Write side of the observable state
pub struct FeedChannels {
    selection: watch::Sender<MarketSelection>,
    book: watch::Sender<OrderBookState>,
    trades: watch::Sender<Vec<Trade>>,
    connected: watch::Sender<bool>,
    summary: watch::Sender<Option<MarketSummary>>,
}

impl FeedChannels {
    pub fn new(selection: MarketSelection) -> Self {
        let (book, _) = watch::channel(OrderBookState::empty(&selection.symbol));
        let (trades, _) = watch::channel(Vec::new());
        let (connected, _) = watch::channel(false);
        let (summary, _) = watch::channel(None);
        let (selection, _) = watch::channel(selection);

        Self {
            selection,
            book,
            trades,
            connected,
            summary,
        }
    }

    /// Read-only view over the channels
    pub fn view(&self) -> MarketView {
        MarketView {
            selection: self.selection.subscribe(),
            book: self.book.subscribe(),
            trades: self.trades.subscribe(),
            connected: self.connected.subscribe(),
            summary: self.summary.subscribe(),
        }
    }

    /// Replace everything for a new selection: empty book and tape, no summary, disconnected
    pub(crate) fn reset(&self, selection: MarketSelection) {
        self.book
            .send_replace(OrderBookState::empty(&selection.symbol));
        self.trades.send_replace(Vec::new());
        self.summary.send_replace(None);
        self.connected.send_replace(false);
        self.selection.send_replace(selection);
    }

    pub(crate) fn publish_book(&self, state: OrderBookState) {
        self.book.send_replace(state);
    }

    pub(crate) fn publish_trades(&self, trades: Vec<Trade>) {
        self.trades.send_replace(trades);
    }

    pub(crate) fn publish_summary(&self, summary: Option<MarketSummary>) {
        self.summary.send_replace(summary);
    }

    /// Returns true if the flag changed
    pub(crate) fn publish_connected(&self, connected: bool) -> bool {
        self.connected.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        })
    }
}

/// Read-only access to the feed's current state
#[derive(Clone)]
pub struct MarketView {
    selection: watch::Receiver<MarketSelection>,
    book: watch::Receiver<OrderBookState>,
    trades: watch::Receiver<Vec<Trade>>,
    connected: watch::Receiver<bool>,
    summary: watch::Receiver<Option<MarketSummary>>,
}

impl MarketView {
    pub fn selection(&self) -> MarketSelection {
        self.selection.borrow().clone()
    }

    pub fn order_book(&self) -> OrderBookState {
        self.book.borrow().clone()
    }

    pub fn depth_curve(&self) -> DepthCurve {
        self.book.borrow().depth_curve()
    }

    /// Trade history, newest first
    pub fn trades(&self) -> Vec<Trade> {
        self.trades.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn summary(&self) -> Option<MarketSummary> {
        self.summary.borrow().clone()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<MarketSelection> {
        self.selection.clone()
    }

    pub fn subscribe_book(&self) -> watch::Receiver<OrderBookState> {
        self.book.clone()
    }

    pub fn subscribe_trades(&self) -> watch::Receiver<Vec<Trade>> {
        self.trades.clone()
    }

    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    pub fn subscribe_summary(&self) -> watch::Receiver<Option<MarketSummary>> {
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::AssetClass;
    use crate::trades::TakerSide;
    use rust_decimal_macros::dec;

    #[test]
    fn test_view_sees_published_state_and_reset() {
        let channels = FeedChannels::new(MarketSelection::default());
        let view = channels.view();

        channels.publish_trades(vec![Trade {
            id: 1,
            price: dec!(10),
            size: dec!(1),
            timestamp: 0,
            side: TakerSide::Buy,
        }]);
        assert!(channels.publish_connected(true));
        assert!(!channels.publish_connected(true));

        assert_eq!(view.trades().len(), 1);
        assert!(view.is_connected());

        let stocks = MarketSelection::for_asset_class(AssetClass::Stock);
        channels.reset(stocks.clone());

        assert!(view.trades().is_empty());
        assert!(!view.is_connected());
        assert!(view.summary().is_none());
        assert_eq!(view.selection(), stocks);
        assert_eq!(view.order_book().symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let channels = FeedChannels::new(MarketSelection::default());
        let mut connected = channels.view().subscribe_connected();

        channels.publish_connected(true);
        connected.changed().await.unwrap();
        assert!(*connected.borrow());
    }
}
