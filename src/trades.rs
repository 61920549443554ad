//! Trade records and the bounded, newest-first trade tape.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of trades kept on the tape
pub const MAX_TRADES: usize = 100;

/// Side that initiated a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakerSide {
    Buy,
    Sell,
}

/// An executed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub price: Decimal,
    pub size: Decimal,
    /// Execution time in milliseconds since the Unix epoch
    pub timestamp: u64,
    pub side: TakerSide,
}

/// Trade history, newest first
#[derive(Debug, Clone)]
pub struct TradeTape {
    trades: VecDeque<Trade>,
    capacity: usize,
}

impl TradeTape {
    pub fn new() -> Self {
        Self::with_capacity(MAX_TRADES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            trades: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a trade at the head, evicting the oldest entry when full
    pub fn push(&mut self, trade: Trade) {
        self.trades.push_front(trade);
        self.trades.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&Trade> {
        self.trades.front()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    /// Copy of the tape for publishing
    pub fn to_vec(&self) -> Vec<Trade> {
        self.trades.iter().cloned().collect()
    }
}

impl Default for TradeTape {
    fn default() -> Self {
        Self::new()
    }
}
