//! Depth Feed - Market Data Library
//!
//! Maintains one active market data source (seeded demo generator or the
//! Binance public streams) for a symbol selection, and exposes the resulting
//! order book, trade tape, connection flag and market summary as read-only,
//! observable state.

pub mod config;
pub mod demo;
pub mod error;
pub mod feed;
pub mod market;
pub mod monitoring;
pub mod orderbook;
pub mod parser;
pub mod server;
pub mod state;
pub mod summary;
pub mod trades;
pub mod websocket;

pub use config::Config;
pub use demo::{DemoGenerator, DemoTick};
pub use error::{FeedError, Result};
pub use feed::{FeedCommand, FeedHandle, MarketDataFeed};
pub use market::{AssetClass, MarketSelection, Provider, SelectionChange};
pub use monitoring::FeedMetrics;
pub use orderbook::{DepthCurve, Level, OrderBook, OrderBookMetrics, OrderBookState, Side, UpdateOutcome};
pub use parser::{DepthUpdate, OrderBookSnapshot, ParsedMessage, PriceLevel, TickerUpdate, TradeEvent};
pub use state::MarketView;
pub use summary::{MarketSummary, SummaryTracker};
pub use trades::{TakerSide, Trade, TradeTape, MAX_TRADES};

/// Application state shared with the HTTP server
pub struct AppState {
    pub feed: FeedHandle,
    pub metrics: FeedMetrics,
}
