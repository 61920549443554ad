//! Touch and depth figures shown next to the book

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Figures drawn alongside the ladder. Mid and spread stay `None` while
/// either side is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookMetrics {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub spread_bps: Option<Decimal>,

    /// (bid size - ask size) / total over the top levels, in [-1, 1]
    pub imbalance: Option<Decimal>,

    /// Summed size per side over the kept levels
    pub bid_depth: Decimal,
    pub ask_depth: Decimal,

    pub bid_levels: usize,
    pub ask_levels: usize,
}

impl OrderBookMetrics {
    /// Both sides populated, so the book can be drawn with a touch
    pub fn is_healthy(&self) -> bool {
        self.mid_price.is_some()
            && self.spread_bps.is_some()
            && self.bid_levels > 0
            && self.ask_levels > 0
    }

    pub fn volume_ratio(&self) -> Option<Decimal> {
        if self.ask_depth > Decimal::ZERO {
            Some(self.bid_depth / self.ask_depth)
        } else {
            None
        }
    }
}
