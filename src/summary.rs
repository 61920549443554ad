//! Market summary derived from trades and 24h ticker events.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::parser::TickerUpdate;

/// Headline statistics for the selected symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub symbol: String,
    pub last_price: Decimal,
    /// Absolute change against the session open
    pub change: Decimal,
    /// Percentage change against the session open, two decimal places
    pub change_percent: Decimal,
    pub volume: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

/// Accumulates session statistics and produces a [`MarketSummary`] on demand
#[derive(Debug, Clone)]
pub struct SummaryTracker {
    symbol: String,
    open: Option<Decimal>,
    last: Option<Decimal>,
    high: Option<Decimal>,
    low: Option<Decimal>,
    volume: Decimal,
}

impl SummaryTracker {
    /// Create a tracker. Without an `open`, the first trade price becomes the open.
    pub fn new(symbol: &str, open: Option<Decimal>) -> Self {
        Self {
            symbol: symbol.to_string(),
            open,
            last: None,
            high: None,
            low: None,
            volume: Decimal::ZERO,
        }
    }

    /// Fold a trade into the session statistics
    pub fn on_trade(&mut self, price: Decimal, size: Decimal) {
        self.open.get_or_insert(price);
        self.last = Some(price);
        self.high = Some(self.high.map_or(price, |h| h.max(price)));
        self.low = Some(self.low.map_or(price, |l| l.min(price)));
        self.volume += size;
    }

    /// Replace the session statistics with the exchange's rolling 24h window
    pub fn on_ticker(&mut self, ticker: &TickerUpdate) {
        self.open = Some(ticker.open_price);
        self.last = Some(ticker.last_price);
        self.high = Some(ticker.high_price);
        self.low = Some(ticker.low_price);
        self.volume = ticker.volume;
    }

    /// Current summary, or `None` before any price has been seen
    pub fn summary(&self) -> Option<MarketSummary> {
        let last = self.last?;
        let open = self.open.unwrap_or(last);
        let change = last - open;
        let change_percent = if open.is_zero() {
            Decimal::ZERO
        } else {
            (change / open * Decimal::from(100)).round_dp(2)
        };

        Some(MarketSummary {
            symbol: self.symbol.clone(),
            last_price: last,
            change,
            change_percent,
            volume: self.volume,
            high: self.high.unwrap_or(last),
            low: self.low.unwrap_or(last),
        })
    }
}
