//! Demo market data generator
//!
//! Synthesizes an order book snapshot and a trade per tick around a random
//! walk of the selected symbol's reference price. Only the last price is
//! carried from one tick to the next. With a seed, output is deterministic.

use rand::prelude::*;
use rand_distr::StandardNormal;
use rust_decimal::prelude::*;

use crate::market::{AssetClass, MarketSelection};
use crate::parser::{OrderBookSnapshot, PriceLevel};
use crate::trades::{TakerSide, Trade};

/// Levels generated per side
pub const DEMO_LEVELS: usize = 20;

/// Standard deviation of the per-tick relative price move
const TICK_VOLATILITY: f64 = 0.0005;

/// The walk never drops below this fraction of the reference price
const PRICE_FLOOR_RATIO: f64 = 0.01;

/// Significant digits kept in a price, which fixes the tick size
const PRICE_PRECISION: i32 = 4;

/// Notional range (quote currency) of a resting level
const LEVEL_NOTIONAL: (f64, f64) = (500.0, 50_000.0);

/// Notional range (quote currency) of a trade
const TRADE_NOTIONAL: (f64, f64) = (100.0, 10_000.0);

/// Output of one generator tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoTick {
    pub snapshot: OrderBookSnapshot,
    pub trade: Trade,
}

/// Random-walk order book and trade generator
pub struct DemoGenerator {
    rng: StdRng,
    reference_price: f64,
    last_price: f64,
    /// Decimal places of a price; the tick size is `10^-price_scale`
    price_scale: u32,
    size_scale: u32,
    levels: usize,
    next_trade_id: u64,
    update_id: u64,
}

impl DemoGenerator {
    /// Create a generator for a selection. `seed` makes the output reproducible.
    pub fn new(selection: &MarketSelection, seed: Option<u64>) -> Self {
        Self::with_reference_price(selection.asset_class, selection.reference_price(), seed)
    }

    pub fn with_reference_price(
        asset_class: AssetClass,
        reference_price: Decimal,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let reference = reference_price.to_f64().unwrap_or(100.0).max(f64::EPSILON);

        Self {
            rng,
            reference_price: reference,
            last_price: reference,
            price_scale: price_scale_for(reference),
            size_scale: asset_class.size_decimals(),
            levels: DEMO_LEVELS,
            next_trade_id: 1,
            update_id: 0,
        }
    }

    /// Number of levels produced on each side
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    pub fn last_price(&self) -> Decimal {
        self.to_price(self.ticks(self.last_price))
    }

    /// Advance the walk and synthesize a snapshot and a trade stamped `timestamp`
    pub fn next_tick(&mut self, timestamp: u64) -> DemoTick {
        let previous = self.last_price;
        let step: f64 = self.rng.sample(StandardNormal);
        let floor = self.reference_price * PRICE_FLOOR_RATIO;
        self.last_price = (previous * (1.0 + step * TICK_VOLATILITY)).max(floor);

        // Keep at least one tick so the touch never crosses
        let mid_ticks = self.ticks(self.last_price).max(self.levels as i64 * 3 + 2);
        self.update_id += 1;

        let mut bids = Vec::with_capacity(self.levels);
        let mut asks = Vec::with_capacity(self.levels);
        let mut bid_offset = 0;
        let mut ask_offset = 0;
        for _ in 0..self.levels {
            bid_offset += self.rng.gen_range(1..=3);
            ask_offset += self.rng.gen_range(1..=3);

            let bid_price = self.to_price(mid_ticks - bid_offset);
            let bid_size = self.random_size(LEVEL_NOTIONAL, bid_price);
            bids.push(PriceLevel::new(bid_price, bid_size));

            let ask_price = self.to_price(mid_ticks + ask_offset);
            let ask_size = self.random_size(LEVEL_NOTIONAL, ask_price);
            asks.push(PriceLevel::new(ask_price, ask_size));
        }

        let trade_price = self.to_price(mid_ticks);
        let side = if self.last_price >= previous {
            TakerSide::Buy
        } else {
            TakerSide::Sell
        };
        let trade = Trade {
            id: self.next_trade_id,
            price: trade_price,
            size: self.random_size(TRADE_NOTIONAL, trade_price),
            timestamp,
            side,
        };
        self.next_trade_id += 1;

        DemoTick {
            snapshot: OrderBookSnapshot {
                last_update_id: self.update_id,
                bids,
                asks,
            },
            trade,
        }
    }

    fn ticks(&self, price: f64) -> i64 {
        (price * 10f64.powi(self.price_scale as i32)).round() as i64
    }

    fn to_price(&self, ticks: i64) -> Decimal {
        Decimal::new(ticks, self.price_scale)
    }

    /// A strictly positive size worth a random notional at `price`
    fn random_size(&mut self, notional: (f64, f64), price: Decimal) -> Decimal {
        let notional = self.rng.gen_range(notional.0..notional.1);
        let price = price.to_f64().unwrap_or(self.reference_price).max(f64::EPSILON);
        let minimum = Decimal::new(1, self.size_scale);
        Decimal::from_f64(notional / price)
            .map(|size| size.round_dp(self.size_scale))
            .unwrap_or(minimum)
            .max(minimum)
    }
}

/// Decimal places that keep `PRICE_PRECISION` significant digits above the point
fn price_scale_for(price: f64) -> u32 {
    let magnitude = price.log10().floor() as i32;
    (PRICE_PRECISION - magnitude).clamp(0, 8) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Provider;
    use rust_decimal_macros::dec;

    fn btc() -> MarketSelection {
        MarketSelection::new("BTCUSDT", AssetClass::Crypto, Provider::Demo)
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let mut a = DemoGenerator::new(&btc(), Some(42));
        let mut b = DemoGenerator::new(&btc(), Some(42));

        for i in 0..50 {
            assert_eq!(a.next_tick(i), b.next_tick(i));
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = DemoGenerator::new(&btc(), Some(1));
        let mut b = DemoGenerator::new(&btc(), Some(2));

        let ticks_a: Vec<DemoTick> = (0..10).map(|i| a.next_tick(i)).collect();
        let ticks_b: Vec<DemoTick> = (0..10).map(|i| b.next_tick(i)).collect();
        assert_ne!(ticks_a, ticks_b);
    }

    #[test]
    fn test_snapshot_shape() {
        let mut generator = DemoGenerator::new(&btc(), Some(7));
        let tick = generator.next_tick(1_700_000_000_000);
        let snapshot = &tick.snapshot;

        assert_eq!(snapshot.bids.len(), DEMO_LEVELS);
        assert_eq!(snapshot.asks.len(), DEMO_LEVELS);
        assert!(snapshot.bids.windows(2).all(|w| w[0].price > w[1].price));
        assert!(snapshot.asks.windows(2).all(|w| w[0].price < w[1].price));
        assert!(snapshot.bids[0].price < snapshot.asks[0].price);
        assert!(snapshot
            .bids
            .iter()
            .chain(snapshot.asks.iter())
            .all(|level| level.size > Decimal::ZERO));

        assert!(tick.trade.price > snapshot.bids[0].price);
        assert!(tick.trade.price < snapshot.asks[0].price);
        assert_eq!(tick.trade.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_custom_level_count() {
        let mut generator = DemoGenerator::new(&btc(), Some(9)).with_levels(5);
        let tick = generator.next_tick(0);

        assert_eq!(tick.snapshot.bids.len(), 5);
        assert_eq!(tick.snapshot.asks.len(), 5);
    }

    #[test]
    fn test_ids_increase_per_tick() {
        let mut generator = DemoGenerator::new(&btc(), Some(3));
        let first = generator.next_tick(0);
        let second = generator.next_tick(1);

        assert_eq!(first.trade.id, 1);
        assert_eq!(second.trade.id, 2);
        assert_eq!(first.snapshot.last_update_id, 1);
        assert_eq!(second.snapshot.last_update_id, 2);
    }

    #[test]
    fn test_walk_stays_near_reference() {
        let mut generator = DemoGenerator::new(&btc(), Some(11));
        for i in 0..100 {
            generator.next_tick(i);
        }
        let price = generator.last_price();
        assert!(price > dec!(50000) && price < dec!(80000));
    }

    #[test]
    fn test_stock_sizes_are_whole_shares() {
        let selection = MarketSelection::for_asset_class(AssetClass::Stock);
        let mut generator = DemoGenerator::new(&selection, Some(5));
        let tick = generator.next_tick(0);

        assert!(tick
            .snapshot
            .bids
            .iter()
            .all(|level| level.size.fract().is_zero() && level.size >= Decimal::ONE));
        assert_eq!(tick.snapshot.bids[0].price.scale(), 2);
    }

    #[test]
    fn test_price_scale() {
        assert_eq!(price_scale_for(65000.0), 0);
        assert_eq!(price_scale_for(190.0), 2);
        assert_eq!(price_scale_for(0.6), 5);
    }
}
