//! Core order book implementation
//!
//! Uses BTreeMap for sorted price level management. Bids are keyed by
//! `Reverse<Decimal>` so both sides iterate from the touch outward.

use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::{Level, OrderBookMetrics, OrderBookState, Side};
use crate::parser::{DepthUpdate, OrderBookSnapshot};

/// Number of levels per side used for the imbalance metric
const IMBALANCE_LEVELS: usize = 5;

/// Result of applying an incremental depth update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The update is older than the book and was skipped
    Stale,
    /// Updates were missed between the book and this event
    Gap { expected: u64, got: u64 },
    /// No snapshot has been applied yet
    Uninitialized,
}

/// Order book for a single symbol
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    /// Bids sorted by price descending (highest first)
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    /// Asks sorted by price ascending (lowest first)
    asks: BTreeMap<Decimal, Decimal>,
    /// Last processed update ID
    last_update_id: u64,
    /// Whether the book has been initialized with a snapshot
    initialized: bool,
    /// Maximum depth levels to maintain
    max_depth: usize,
    /// Timestamp of last update
    last_update_time: u64,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(symbol: &str, max_depth: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_id: 0,
            initialized: false,
            max_depth: max_depth.max(1),
            last_update_time: 0,
        }
    }

    /// Replace the book contents with a snapshot.
    ///
    /// Returns false if the snapshot is older than the book, which is left untouched.
    pub fn apply_snapshot(&mut self, snapshot: &OrderBookSnapshot, timestamp: u64) -> bool {
        if self.initialized && snapshot.last_update_id < self.last_update_id {
            return false;
        }

        self.bids.clear();
        self.asks.clear();

        for level in &snapshot.bids {
            self.apply_level(Side::Bid, level.price, level.size);
        }
        for level in &snapshot.asks {
            self.apply_level(Side::Ask, level.price, level.size);
        }

        self.last_update_id = snapshot.last_update_id;
        self.last_update_time = timestamp;
        self.initialized = true;
        self.trim_depth();

        true
    }

    /// Apply a depth update
    pub fn apply_update(&mut self, update: &DepthUpdate) -> UpdateOutcome {
        if !self.initialized {
            return UpdateOutcome::Uninitialized;
        }

        if update.final_update_id <= self.last_update_id {
            return UpdateOutcome::Stale;
        }

        let expected = self.last_update_id + 1;
        if update.first_update_id > expected {
            return UpdateOutcome::Gap {
                expected,
                got: update.first_update_id,
            };
        }

        for level in &update.bids {
            self.apply_level(Side::Bid, level.price, level.size);
        }
        for level in &update.asks {
            self.apply_level(Side::Ask, level.price, level.size);
        }

        self.last_update_id = update.final_update_id;
        self.last_update_time = update.event_time;
        self.trim_depth();

        UpdateOutcome::Applied
    }

    /// Add, update or remove a single price level. A non-positive size removes it.
    pub fn apply_level(&mut self, side: Side, price: Decimal, size: Decimal) {
        let remove = size <= Decimal::ZERO;
        match side {
            Side::Bid => {
                if remove {
                    self.bids.remove(&Reverse(price));
                } else {
                    self.bids.insert(Reverse(price), size);
                }
            }
            Side::Ask => {
                if remove {
                    self.asks.remove(&price);
                } else {
                    self.asks.insert(price, size);
                }
            }
        }
    }

    /// Trim the book to max depth
    fn trim_depth(&mut self) {
        while self.bids.len() > self.max_depth {
            self.bids.pop_last();
        }
        while self.asks.len() > self.max_depth {
            self.asks.pop_last();
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first_key_value().map(|(Reverse(p), _)| *p)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first_key_value().map(|(p, _)| *p)
    }

    /// Size resting at a price on one side
    pub fn size_at(&self, side: Side, price: Decimal) -> Option<Decimal> {
        match side {
            Side::Bid => self.bids.get(&Reverse(price)).copied(),
            Side::Ask => self.asks.get(&price).copied(),
        }
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get spread in basis points
    pub fn spread_bps(&self) -> Option<Decimal> {
        match (self.spread(), self.mid_price()) {
            (Some(spread), Some(mid)) if mid > Decimal::ZERO => {
                Some(spread / mid * Decimal::from(10000))
            }
            _ => None,
        }
    }

    /// Calculate order book imbalance at top N levels
    pub fn imbalance(&self, levels: usize) -> Option<Decimal> {
        let bid_volume: Decimal = self.bids.values().take(levels).sum();
        let ask_volume: Decimal = self.asks.values().take(levels).sum();

        let total = bid_volume + ask_volume;
        if total > Decimal::ZERO {
            Some((bid_volume - ask_volume) / total)
        } else {
            None
        }
    }

    /// Check if the book is initialized
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Get last update ID
    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Get current state for publishing
    pub fn state(&self) -> OrderBookState {
        OrderBookState {
            symbol: self.symbol.clone(),
            timestamp: self.last_update_time,
            last_update_id: self.last_update_id,
            bids: self
                .bids
                .iter()
                .map(|(Reverse(p), s)| Level {
                    price: *p,
                    size: *s,
                })
                .collect(),
            asks: self
                .asks
                .iter()
                .map(|(p, s)| Level {
                    price: *p,
                    size: *s,
                })
                .collect(),
            metrics: self.calculate_metrics(),
        }
    }

    /// Calculate order book metrics
    fn calculate_metrics(&self) -> OrderBookMetrics {
        OrderBookMetrics {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            mid_price: self.mid_price(),
            spread: self.spread(),
            spread_bps: self.spread_bps(),
            imbalance: self.imbalance(IMBALANCE_LEVELS),
            bid_depth: self.bids.values().copied().sum(),
            ask_depth: self.asks.values().copied().sum(),
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PriceLevel;
    use rust_decimal_macros::dec;

    fn create_test_book() -> OrderBook {
        let mut book = OrderBook::new("BTCUSDT", 10);
        let snapshot = OrderBookSnapshot {
            last_update_id: 100,
            bids: vec![
                PriceLevel::new(dec!(50000), dec!(1.0)),
                PriceLevel::new(dec!(49999), dec!(2.0)),
            ],
            asks: vec![
                PriceLevel::new(dec!(50001), dec!(1.5)),
                PriceLevel::new(dec!(50002), dec!(2.5)),
            ],
        };
        assert!(book.apply_snapshot(&snapshot, 1000));
        book
    }

    fn update(first: u64, last: u64, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> DepthUpdate {
        DepthUpdate {
            event_type: "depthUpdate".to_string(),
            event_time: 2000 + last,
            symbol: "BTCUSDT".to_string(),
            first_update_id: first,
            final_update_id: last,
            bids,
            asks,
        }
    }

    fn assert_sorted(book: &OrderBook) {
        let state = book.state();
        assert!(state.bids.windows(2).all(|w| w[0].price > w[1].price));
        assert!(state.asks.windows(2).all(|w| w[0].price < w[1].price));
    }

    #[test]
    fn test_best_bid_ask() {
        let book = create_test_book();
        assert_eq!(book.best_bid(), Some(dec!(50000)));
        assert_eq!(book.best_ask(), Some(dec!(50001)));
        assert_eq!(book.spread(), Some(dec!(1)));
    }

    #[test]
    fn test_mid_price() {
        let book = create_test_book();
        assert_eq!(book.mid_price(), Some(dec!(50000.5)));
    }

    #[test]
    fn test_imbalance() {
        let book = create_test_book();
        // Bids: 1.0 + 2.0 = 3.0, Asks: 1.5 + 2.5 = 4.0
        // Imbalance = (3.0 - 4.0) / (3.0 + 4.0) = -1/7
        let imbalance = book.imbalance(10).unwrap();
        assert!(imbalance < Decimal::ZERO);
    }

    #[test]
    fn test_apply_update() {
        let mut book = create_test_book();
        let upd = update(
            101,
            102,
            vec![PriceLevel::new(dec!(50000), dec!(2.0))],
            vec![PriceLevel::new(dec!(50003), dec!(0.7))],
        );

        assert_eq!(book.apply_update(&upd), UpdateOutcome::Applied);
        assert_eq!(book.last_update_id(), 102);
        assert_eq!(book.size_at(Side::Bid, dec!(50000)), Some(dec!(2.0)));
        assert_eq!(book.size_at(Side::Ask, dec!(50003)), Some(dec!(0.7)));
        assert_eq!(book.ask_levels(), 3);
        assert_sorted(&book);
    }

    #[test]
    fn test_zero_size_removes_level() {
        let mut book = create_test_book();
        let upd = update(
            101,
            101,
            vec![PriceLevel::new(dec!(50000), dec!(0))],
            vec![
                PriceLevel::new(dec!(50001), dec!(0.000)),
                PriceLevel::new(dec!(49000), dec!(0)),
            ],
        );

        assert_eq!(book.apply_update(&upd), UpdateOutcome::Applied);
        assert_eq!(book.size_at(Side::Bid, dec!(50000)), None);
        assert_eq!(book.size_at(Side::Ask, dec!(50001)), None);
        assert_eq!(book.best_bid(), Some(dec!(49999)));
        assert_eq!(book.best_ask(), Some(dec!(50002)));
        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.ask_levels(), 1);
    }

    #[test]
    fn test_stale_update_is_skipped() {
        let mut book = create_test_book();
        let upd = update(90, 100, vec![PriceLevel::new(dec!(1), dec!(1))], vec![]);

        assert_eq!(book.apply_update(&upd), UpdateOutcome::Stale);
        assert_eq!(book.last_update_id(), 100);
        assert_eq!(book.size_at(Side::Bid, dec!(1)), None);
    }

    #[test]
    fn test_straddling_update_is_applied() {
        let mut book = create_test_book();
        let upd = update(95, 105, vec![PriceLevel::new(dec!(49998), dec!(1))], vec![]);

        assert_eq!(book.apply_update(&upd), UpdateOutcome::Applied);
        assert_eq!(book.last_update_id(), 105);
    }

    #[test]
    fn test_gap_is_reported() {
        let mut book = create_test_book();
        let upd = update(110, 112, vec![], vec![]);

        assert_eq!(
            book.apply_update(&upd),
            UpdateOutcome::Gap {
                expected: 101,
                got: 110
            }
        );
        assert_eq!(book.last_update_id(), 100);
    }

    #[test]
    fn test_update_before_snapshot() {
        let mut book = OrderBook::new("BTCUSDT", 10);
        let upd = update(1, 2, vec![PriceLevel::new(dec!(1), dec!(1))], vec![]);
        assert_eq!(book.apply_update(&upd), UpdateOutcome::Uninitialized);
        assert!(!book.is_initialized());
    }

    #[test]
    fn test_older_snapshot_is_rejected() {
        let mut book = create_test_book();
        let older = OrderBookSnapshot {
            last_update_id: 50,
            bids: vec![],
            asks: vec![],
        };
        assert!(!book.apply_snapshot(&older, 0));
        assert_eq!(book.bid_levels(), 2);
    }

    #[test]
    fn test_depth_is_trimmed_from_the_far_side() {
        let mut book = OrderBook::new("BTCUSDT", 3);
        let snapshot = OrderBookSnapshot {
            last_update_id: 1,
            bids: (0..6)
                .map(|i| PriceLevel::new(dec!(100) - Decimal::from(i), dec!(1)))
                .collect(),
            asks: (0..6)
                .map(|i| PriceLevel::new(dec!(101) + Decimal::from(i), dec!(1)))
                .collect(),
        };
        book.apply_snapshot(&snapshot, 0);

        let state = book.state();
        let bid_prices: Vec<Decimal> = state.bids.iter().map(|l| l.price).collect();
        let ask_prices: Vec<Decimal> = state.asks.iter().map(|l| l.price).collect();
        assert_eq!(bid_prices, vec![dec!(100), dec!(99), dec!(98)]);
        assert_eq!(ask_prices, vec![dec!(101), dec!(102), dec!(103)]);
    }

    #[test]
    fn test_zero_depth_keeps_the_touch() {
        let mut book = OrderBook::new("BTCUSDT", 0);
        let snapshot = OrderBookSnapshot {
            last_update_id: 1,
            bids: vec![
                PriceLevel::new(dec!(100), dec!(1)),
                PriceLevel::new(dec!(99), dec!(1)),
            ],
            asks: vec![
                PriceLevel::new(dec!(101), dec!(1)),
                PriceLevel::new(dec!(102), dec!(1)),
            ],
        };
        book.apply_snapshot(&snapshot, 0);

        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.ask_levels(), 1);
        assert_eq!(book.best_bid(), Some(dec!(100)));
        assert_eq!(book.best_ask(), Some(dec!(101)));
    }

    #[test]
    fn test_sorted_after_every_update() {
        let mut book = create_test_book();
        let prices = [
            dec!(49990),
            dec!(50010),
            dec!(49995),
            dec!(50005),
            dec!(49999.5),
            dec!(50001.5),
        ];

        for (i, price) in prices.iter().enumerate() {
            let id = 101 + i as u64;
            let size = if i % 3 == 2 { dec!(0) } else { dec!(0.25) };
            let upd = update(
                id,
                id,
                vec![PriceLevel::new(*price - dec!(20), size)],
                vec![PriceLevel::new(*price + dec!(20), size)],
            );
            assert_eq!(book.apply_update(&upd), UpdateOutcome::Applied);
            assert_sorted(&book);
        }
    }

    #[test]
    fn test_state_metrics_and_depth_curve() {
        let book = create_test_book();
        let state = book.state();

        assert_eq!(state.last_update_id, 100);
        assert_eq!(state.metrics.bid_depth, dec!(3.0));
        assert_eq!(state.metrics.ask_depth, dec!(4.0));
        assert!(state.metrics.is_healthy());

        let curve = state.depth_curve();
        let bid_totals: Vec<Decimal> = curve.bids.iter().map(|l| l.size).collect();
        let ask_totals: Vec<Decimal> = curve.asks.iter().map(|l| l.size).collect();
        assert_eq!(bid_totals, vec![dec!(1.0), dec!(3.0)]);
        assert_eq!(ask_totals, vec![dec!(1.5), dec!(4.0)]);
    }
}
