//! Order book module
//!
//! Maintains the order book for the selected symbol from snapshots and
//! incremental depth updates.

mod book;
mod metrics;

pub use book::{OrderBook, UpdateOutcome};
pub use metrics::OrderBookMetrics;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// A single level in the order book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub size: Decimal,
}

/// Order book state published to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookState {
    pub symbol: String,
    pub timestamp: u64,
    pub last_update_id: u64,
    /// Highest price first
    pub bids: Vec<Level>,
    /// Lowest price first
    pub asks: Vec<Level>,
    pub metrics: OrderBookMetrics,
}

/// Cumulative size from the touch outward, per side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthCurve {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl OrderBookState {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp: 0,
            last_update_id: 0,
            bids: Vec::new(),
            asks: Vec::new(),
            metrics: OrderBookMetrics::default(),
        }
    }

    /// Running totals of size on each side, for depth charts and heatmaps
    pub fn depth_curve(&self) -> DepthCurve {
        fn accumulate(levels: &[Level]) -> Vec<Level> {
            let mut total = Decimal::ZERO;
            levels
                .iter()
                .map(|level| {
                    total += level.size;
                    Level {
                        price: level.price,
                        size: total,
                    }
                })
                .collect()
        }

        DepthCurve {
            bids: accumulate(&self.bids),
            asks: accumulate(&self.asks),
        }
    }
}
