//! Price quotes and per-symbol broadcast state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DataSource, Symbol};

/// A single price observation returned by a market data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: Symbol,
    /// Last traded price
    pub price: f64,
    /// Session volume (0 when the provider does not report one)
    pub volume: f64,
    /// Provider's previous session close, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    pub source: DataSource,
    pub timestamp: DateTime<Utc>,
}

impl PriceQuote {
    /// Whether the quote carries a usable price
    pub fn is_valid(&self) -> bool {
        self.price.is_finite()
    }
}

/// Percent change from `previous` to `current`
///
/// Defined as `0.0` when `previous <= 0` so a zero or missing baseline never
/// produces `NaN` or infinity.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous.is_nan() || previous <= 0.0 {
        return 0.0;
    }
    let pct = (current - previous) / previous * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Last broadcast snapshot for one symbol
///
/// Serialized as the `data` payload of a `price_update` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPriceState {
    pub symbol: Symbol,
    pub price: f64,
    pub volume: f64,
    /// Absolute change against `prev_price`
    pub change: f64,
    pub change_percent: f64,
    /// Price of the previous broadcast (equal to `price` on first observation)
    pub prev_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    pub source: DataSource,
    pub timestamp: DateTime<Utc>,
}

impl SymbolPriceState {
    /// Build the next state for a symbol from a fresh quote
    pub fn from_quote(quote: PriceQuote, previous: Option<&SymbolPriceState>) -> Self {
        let prev_price = previous.map(|p| p.price).unwrap_or(quote.price);
        let change = quote.price - prev_price;

        Self {
            symbol: quote.symbol,
            price: quote.price,
            volume: quote.volume,
            change,
            change_percent: percent_change(quote.price, prev_price),
            prev_price,
            previous_close: quote.previous_close,
            source: quote.source,
            timestamp: quote.timestamp,
        }
    }
}
