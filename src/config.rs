//! Configuration module for the market data feed

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;

use crate::market::{AssetClass, MarketSelection, Provider};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// WebSocket endpoint for Binance combined streams
    pub ws_endpoint: String,

    /// REST API endpoint for snapshots
    pub rest_endpoint: String,

    /// Order book depth levels to request and maintain
    pub depth_levels: usize,

    /// Fixed delay before reconnecting a live stream
    pub reconnect_delay_ms: u64,

    /// Demo generator tick period
    pub demo_interval_ms: u64,

    /// Seed for reproducible demo data
    pub demo_seed: Option<u64>,

    /// Address of the HTTP state and health server
    pub http_addr: SocketAddr,

    /// Interval between status log lines
    pub status_log_interval_secs: u64,

    /// Initial selection
    pub asset_class: AssetClass,
    pub symbol: String,
    pub provider: Provider,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from a key lookup. Unparseable or zero numbers
    /// fall back to defaults; an invalid asset class or address is an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let asset_class = match lookup("ASSET_CLASS") {
            Some(value) => value
                .parse::<AssetClass>()
                .map_err(anyhow::Error::msg)
                .context("Invalid ASSET_CLASS")?,
            None => defaults.asset_class,
        };

        let http_addr = match lookup("HTTP_ADDR") {
            Some(value) => value
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid HTTP_ADDR: {value}"))?,
            None => defaults.http_addr,
        };

        let positive = |key: &str| -> Option<u64> {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        };

        Ok(Self {
            ws_endpoint: lookup("WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            rest_endpoint: lookup("REST_ENDPOINT").unwrap_or(defaults.rest_endpoint),
            depth_levels: positive("DEPTH_LEVELS")
                .map(|v| v as usize)
                .unwrap_or(defaults.depth_levels),
            reconnect_delay_ms: lookup("RECONNECT_DELAY_MS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.reconnect_delay_ms),
            demo_interval_ms: positive("DEMO_INTERVAL_MS").unwrap_or(defaults.demo_interval_ms),
            demo_seed: lookup("DEMO_SEED").and_then(|v| v.trim().parse().ok()),
            http_addr,
            status_log_interval_secs: positive("STATUS_LOG_INTERVAL_SECS")
                .unwrap_or(defaults.status_log_interval_secs),
            asset_class,
            symbol: lookup("SYMBOL").unwrap_or_else(|| asset_class.default_symbol().to_string()),
            provider: lookup("PROVIDER")
                .map(|v| Provider::from_name(&v))
                .unwrap_or(defaults.provider),
        })
    }

    /// Selection the feed starts with
    pub fn initial_selection(&self) -> MarketSelection {
        MarketSelection::new(&self.symbol, self.asset_class, self.provider)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_endpoint: "wss://stream.binance.com:9443".to_string(),
            rest_endpoint: "https://api.binance.com/api/v3".to_string(),
            depth_levels: 50,
            reconnect_delay_ms: 3000,
            demo_interval_ms: 1000,
            demo_seed: None,
            http_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            status_log_interval_secs: 30,
            asset_class: AssetClass::Crypto,
            symbol: AssetClass::Crypto.default_symbol().to_string(),
            provider: Provider::Demo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selection() {
        let config = Config::default();
        assert_eq!(config.initial_selection(), MarketSelection::default());
    }

    #[test]
    fn test_initial_selection_resolves_provider() {
        let config = Config {
            asset_class: AssetClass::Stock,
            symbol: "tsla".to_string(),
            provider: Provider::Binance,
            ..Config::default()
        };
        let selection = config.initial_selection();
        assert_eq!(selection.symbol, "TSLA");
        assert_eq!(selection.provider, Provider::Demo);
    }

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_empty_lookup_uses_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        let defaults = Config::default();

        assert_eq!(config.depth_levels, defaults.depth_levels);
        assert_eq!(config.demo_interval_ms, defaults.demo_interval_ms);
        assert_eq!(config.http_addr, defaults.http_addr);
        assert_eq!(config.demo_seed, None);
        assert_eq!(config.initial_selection(), MarketSelection::default());
    }

    #[test]
    fn test_values_are_read() {
        let config = Config::from_lookup(lookup_from(&[
            ("DEPTH_LEVELS", "20"),
            ("RECONNECT_DELAY_MS", "500"),
            ("DEMO_INTERVAL_MS", "250"),
            ("DEMO_SEED", "42"),
            ("HTTP_ADDR", "127.0.0.1:8080"),
            ("ASSET_CLASS", "stocks"),
            ("PROVIDER", "demo"),
        ]))
        .unwrap();

        assert_eq!(config.depth_levels, 20);
        assert_eq!(config.reconnect_delay_ms, 500);
        assert_eq!(config.demo_interval_ms, 250);
        assert_eq!(config.demo_seed, Some(42));
        assert_eq!(config.http_addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.asset_class, AssetClass::Stock);
        assert_eq!(config.symbol, "AAPL");
    }

    #[test]
    fn test_invalid_or_zero_numbers_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("DEPTH_LEVELS", "0"),
            ("DEMO_INTERVAL_MS", "0"),
            ("STATUS_LOG_INTERVAL_SECS", "0"),
            ("RECONNECT_DELAY_MS", "soon"),
            ("DEMO_SEED", "-1"),
        ]))
        .unwrap();
        let defaults = Config::default();

        assert_eq!(config.depth_levels, defaults.depth_levels);
        assert_eq!(config.demo_interval_ms, defaults.demo_interval_ms);
        assert_eq!(config.status_log_interval_secs, defaults.status_log_interval_secs);
        assert_eq!(config.reconnect_delay_ms, defaults.reconnect_delay_ms);
        assert_eq!(config.demo_seed, None);
    }

    #[test]
    fn test_invalid_asset_class_and_address_are_errors() {
        assert!(Config::from_lookup(lookup_from(&[("ASSET_CLASS", "forex")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("HTTP_ADDR", "localhost")])).is_err());
    }

    #[test]
    fn test_unknown_provider_resolves_to_demo() {
        let config = Config::from_lookup(lookup_from(&[
            ("PROVIDER", "kraken"),
            ("SYMBOL", "ethusdt"),
        ]))
        .unwrap();

        assert_eq!(config.provider, Provider::Demo);
        assert_eq!(config.initial_selection().symbol, "ETHUSDT");

        let config = Config::from_lookup(lookup_from(&[("PROVIDER", "Binance")])).unwrap();
        assert_eq!(config.provider, Provider::Binance);
    }
}
