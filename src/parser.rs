//! Parser module for Binance WebSocket messages
//!
//! Handles deserialization of depth updates, trades, 24h tickers and REST
//! depth snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::trades::{TakerSide, Trade};

/// Binance depth update message
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdate {
    /// Event type
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time (milliseconds)
    #[serde(rename = "E")]
    pub event_time: u64,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// First update ID in event
    #[serde(rename = "U")]
    pub first_update_id: u64,

    /// Final update ID in event
    #[serde(rename = "u")]
    pub final_update_id: u64,

    /// Bids to update
    #[serde(rename = "b", deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<PriceLevel>,

    /// Asks to update
    #[serde(rename = "a", deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<PriceLevel>,
}

/// Binance trade message
#[derive(Debug, Clone, Deserialize)]
pub struct TradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,

    #[serde(rename = "E")]
    pub event_time: u64,

    #[serde(rename = "s")]
    pub symbol: String,

    #[serde(rename = "t")]
    pub trade_id: u64,

    #[serde(rename = "p", deserialize_with = "deserialize_decimal")]
    pub price: Decimal,

    #[serde(rename = "q", deserialize_with = "deserialize_decimal")]
    pub quantity: Decimal,

    /// Trade time
    #[serde(rename = "T")]
    pub trade_time: u64,

    /// Is buyer maker
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

impl TradeEvent {
    /// Normalize into a tape entry. A buyer-maker trade was taken by a seller.
    pub fn to_trade(&self) -> Trade {
        let side = if self.is_buyer_maker {
            TakerSide::Sell
        } else {
            TakerSide::Buy
        };
        Trade {
            id: self.trade_id,
            price: self.price,
            size: self.quantity,
            timestamp: self.trade_time,
            side,
        }
    }
}

/// Binance 24h rolling window ticker
#[derive(Debug, Clone, Deserialize)]
pub struct TickerUpdate {
    #[serde(rename = "e")]
    pub event_type: String,

    #[serde(rename = "E")]
    pub event_time: u64,

    #[serde(rename = "s")]
    pub symbol: String,

    /// Absolute price change over the window
    #[serde(rename = "p", deserialize_with = "deserialize_decimal")]
    pub price_change: Decimal,

    #[serde(rename = "P", deserialize_with = "deserialize_decimal")]
    pub price_change_percent: Decimal,

    #[serde(rename = "c", deserialize_with = "deserialize_decimal")]
    pub last_price: Decimal,

    #[serde(rename = "o", deserialize_with = "deserialize_decimal")]
    pub open_price: Decimal,

    #[serde(rename = "h", deserialize_with = "deserialize_decimal")]
    pub high_price: Decimal,

    #[serde(rename = "l", deserialize_with = "deserialize_decimal")]
    pub low_price: Decimal,

    /// Base asset volume
    #[serde(rename = "v", deserialize_with = "deserialize_decimal")]
    pub volume: Decimal,
}

/// Price level (price, size pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Order book snapshot from REST API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderBookSnapshot {
    /// Last update ID
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,

    #[serde(deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<PriceLevel>,

    #[serde(deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<PriceLevel>,
}

/// Combined stream message wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    /// Stream name
    pub stream: String,

    /// Data payload
    pub data: serde_json::Value,
}

/// Parsed WebSocket message
#[derive(Debug, Clone)]
pub enum ParsedMessage {
    DepthUpdate(DepthUpdate),
    Trade(TradeEvent),
    Ticker(TickerUpdate),
    Unknown(String),
}

impl ParsedMessage {
    /// Parse a raw WebSocket message
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        // Combined streams wrap the payload
        if let Ok(stream_msg) = serde_json::from_str::<StreamMessage>(raw) {
            return Self::parse_stream_data(&stream_msg.stream, stream_msg.data);
        }

        let value: serde_json::Value = serde_json::from_str(raw)?;
        match value.get("e").and_then(|e| e.as_str()) {
            Some("depthUpdate") => Ok(ParsedMessage::DepthUpdate(serde_json::from_value(value)?)),
            Some("trade") => Ok(ParsedMessage::Trade(serde_json::from_value(value)?)),
            Some("24hrTicker") => Ok(ParsedMessage::Ticker(serde_json::from_value(value)?)),
            _ => Ok(ParsedMessage::Unknown(raw.to_string())),
        }
    }

    fn parse_stream_data(stream: &str, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        if stream.contains("@depth") {
            Ok(ParsedMessage::DepthUpdate(serde_json::from_value(data)?))
        } else if stream.ends_with("@trade") {
            Ok(ParsedMessage::Trade(serde_json::from_value(data)?))
        } else if stream.ends_with("@ticker") {
            Ok(ParsedMessage::Ticker(serde_json::from_value(data)?))
        } else {
            Ok(ParsedMessage::Unknown(data.to_string()))
        }
    }

    /// Symbol the message refers to, if any
    pub fn symbol(&self) -> Option<&str> {
        match self {
            ParsedMessage::DepthUpdate(update) => Some(&update.symbol),
            ParsedMessage::Trade(trade) => Some(&trade.symbol),
            ParsedMessage::Ticker(ticker) => Some(&ticker.symbol),
            ParsedMessage::Unknown(_) => None,
        }
    }

    /// Short label used for logging and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedMessage::DepthUpdate(_) => "depth",
            ParsedMessage::Trade(_) => "trade",
            ParsedMessage::Ticker(_) => "ticker",
            ParsedMessage::Unknown(_) => "unknown",
        }
    }
}

/// Custom deserializer for Decimal from string
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Decimal::from_str(&s).map_err(serde::de::Error::custom)
}

/// Custom deserializer for price levels from array of string pairs
fn deserialize_price_levels<'de, D>(deserializer: D) -> Result<Vec<PriceLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<String>> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|pair| {
            if pair.len() != 2 {
                return Err(serde::de::Error::custom("Invalid price level format"));
            }
            Ok(PriceLevel {
                price: Decimal::from_str(&pair[0]).map_err(serde::de::Error::custom)?,
                size: Decimal::from_str(&pair[1]).map_err(serde::de::Error::custom)?,
            })
        })
        .collect()
}
