//! Session state for one selection
//!
//! Owned by the active source task. Every mutation is published to the
//! observable channels immediately.

use std::sync::Arc;

use crate::demo::DemoTick;
use crate::market::MarketSelection;
use crate::monitoring::FeedMetrics;
use crate::orderbook::{OrderBook, UpdateOutcome};
use crate::parser::{DepthUpdate, OrderBookSnapshot, TickerUpdate};
use crate::state::FeedChannels;
use crate::summary::SummaryTracker;
use crate::trades::{Trade, TradeTape};

pub(crate) struct SessionState {
    book: OrderBook,
    tape: TradeTape,
    summary: SummaryTracker,
    channels: Arc<FeedChannels>,
    metrics: FeedMetrics,
}

impl SessionState {
    /// Fresh state for a selection. Demo sessions open at the reference price;
    /// live sessions take their open from the exchange.
    pub(crate) fn new(
        selection: &MarketSelection,
        max_depth: usize,
        channels: Arc<FeedChannels>,
        metrics: FeedMetrics,
    ) -> Self {
        let open = (!selection.provider.is_live()).then(|| selection.reference_price());
        Self {
            book: OrderBook::new(&selection.symbol, max_depth),
            tape: TradeTape::new(),
            summary: SummaryTracker::new(&selection.symbol, open),
            channels,
            metrics,
        }
    }

    pub(crate) fn symbol(&self) -> &str {
        self.book.symbol()
    }

    pub(crate) fn book(&self) -> &OrderBook {
        &self.book
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: &OrderBookSnapshot, timestamp: u64) {
        if self.book.apply_snapshot(snapshot, timestamp) {
            self.channels.publish_book(self.book.state());
        }
    }

    pub(crate) fn apply_depth(&mut self, update: &DepthUpdate) -> UpdateOutcome {
        let outcome = self.book.apply_update(update);
        if outcome == UpdateOutcome::Applied {
            self.channels.publish_book(self.book.state());
        }
        outcome
    }

    pub(crate) fn record_trade(&mut self, trade: Trade) {
        self.summary.on_trade(trade.price, trade.size);
        self.tape.push(trade);
        self.channels.publish_trades(self.tape.to_vec());
        self.channels.publish_summary(self.summary.summary());
    }

    pub(crate) fn apply_ticker(&mut self, ticker: &TickerUpdate) {
        self.summary.on_ticker(ticker);
        self.channels.publish_summary(self.summary.summary());
    }

    /// Replace the book and record the synthetic trade
    pub(crate) fn apply_demo_tick(&mut self, tick: DemoTick) {
        self.apply_snapshot(&tick.snapshot, tick.trade.timestamp);
        self.record_trade(tick.trade);
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        if self.channels.publish_connected(connected) {
            self.metrics.connected.set(i64::from(connected));
        }
    }
}
