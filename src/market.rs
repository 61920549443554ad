//! Market selection: which symbol, asset class and data provider is active.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference price used by the demo generator for symbols outside the catalogue
const FALLBACK_REFERENCE_PRICE: i64 = 100;

/// Asset class of the instrument being viewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    #[default]
    Crypto,
    Stock,
}

impl AssetClass {
    /// Symbol selected when switching to this asset class
    pub fn default_symbol(self) -> &'static str {
        match self {
            AssetClass::Crypto => "BTCUSDT",
            AssetClass::Stock => "AAPL",
        }
    }

    /// Known symbols and their demo reference prices
    pub fn catalogue(self) -> &'static [(&'static str, &'static str)] {
        match self {
            AssetClass::Crypto => &[
                ("BTCUSDT", "65000"),
                ("ETHUSDT", "3500"),
                ("SOLUSDT", "150"),
                ("BNBUSDT", "600"),
                ("XRPUSDT", "0.6"),
            ],
            AssetClass::Stock => &[
                ("AAPL", "190"),
                ("MSFT", "420"),
                ("NVDA", "900"),
                ("TSLA", "250"),
                ("AMZN", "180"),
            ],
        }
    }

    /// Reference price for a symbol of this class
    pub fn reference_price(self, symbol: &str) -> Decimal {
        self.catalogue()
            .iter()
            .find(|(s, _)| *s == symbol)
            .and_then(|(_, p)| Decimal::from_str(p).ok())
            .unwrap_or_else(|| Decimal::from(FALLBACK_REFERENCE_PRICE))
    }

    /// Decimal places used for order and trade sizes
    pub fn size_decimals(self) -> u32 {
        match self {
            AssetClass::Crypto => 4,
            AssetClass::Stock => 0,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Crypto => write!(f, "crypto"),
            AssetClass::Stock => write!(f, "stock"),
        }
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crypto" => Ok(AssetClass::Crypto),
            "stock" | "stocks" => Ok(AssetClass::Stock),
            other => Err(format!("unknown asset class: {other}")),
        }
    }
}

/// Source of market data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Locally synthesized data
    #[default]
    Demo,
    /// Binance public spot streams
    Binance,
}

impl Provider {
    /// Resolve a provider by name. Unknown names resolve to [`Provider::Demo`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "binance" => Provider::Binance,
            _ => Provider::Demo,
        }
    }

    /// Whether the provider can stream the given asset class
    pub fn supports(self, asset_class: AssetClass) -> bool {
        match self {
            Provider::Demo => true,
            Provider::Binance => asset_class == AssetClass::Crypto,
        }
    }

    pub fn is_live(self) -> bool {
        self != Provider::Demo
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Demo => write!(f, "demo"),
            Provider::Binance => write!(f, "binance"),
        }
    }
}

/// The (symbol, asset class, provider) triple that determines the active source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSelection {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub provider: Provider,
}

impl MarketSelection {
    pub fn new(symbol: &str, asset_class: AssetClass, provider: Provider) -> Self {
        Self {
            symbol: normalize_symbol(symbol)
                .unwrap_or_else(|| asset_class.default_symbol().to_string()),
            asset_class,
            provider,
        }
        .resolved()
    }

    /// Default selection for an asset class: its default symbol on the demo provider
    pub fn for_asset_class(asset_class: AssetClass) -> Self {
        Self {
            symbol: asset_class.default_symbol().to_string(),
            asset_class,
            provider: Provider::Demo,
        }
    }

    /// Replace an unsupported provider with the demo provider
    pub fn resolved(mut self) -> Self {
        if !self.provider.supports(self.asset_class) {
            self.provider = Provider::Demo;
        }
        self
    }

    /// Demo reference price for the selected symbol
    pub fn reference_price(&self) -> Decimal {
        self.asset_class.reference_price(&self.symbol)
    }
}

impl Default for MarketSelection {
    fn default() -> Self {
        Self::for_asset_class(AssetClass::default())
    }
}

impl fmt::Display for MarketSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.asset_class, self.symbol, self.provider)
    }
}

/// A requested change to the current selection.
///
/// Fields are applied in order: asset class, then symbol, then provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SelectionChange {
    pub asset_class: Option<AssetClass>,
    pub symbol: Option<String>,
    pub provider: Option<String>,
}

impl SelectionChange {
    pub fn symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Default::default()
        }
    }

    pub fn asset_class(asset_class: AssetClass) -> Self {
        Self {
            asset_class: Some(asset_class),
            ..Default::default()
        }
    }

    pub fn provider(provider: Provider) -> Self {
        Self {
            provider: Some(provider.to_string()),
            ..Default::default()
        }
    }

    /// Compute the selection that results from applying this change to `current`
    pub fn apply_to(&self, current: &MarketSelection) -> MarketSelection {
        let mut next = current.clone();

        if let Some(asset_class) = self.asset_class {
            if asset_class != next.asset_class {
                next = MarketSelection::for_asset_class(asset_class);
            }
        }

        if let Some(symbol) = self.symbol.as_deref().and_then(normalize_symbol) {
            next.symbol = symbol;
        }

        if let Some(provider) = &self.provider {
            next.provider = Provider::from_name(provider);
        }

        next.resolved()
    }
}

fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim().to_uppercase();
    (!symbol.is_empty()).then_some(symbol)
}
