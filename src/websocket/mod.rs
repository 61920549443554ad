//! WebSocket module for the live Binance connection

mod client;
mod live;

pub use client::WebSocketClient;
pub(crate) use live::LiveSource;
