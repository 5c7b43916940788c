//! Yahoo Finance API response types
//!
//! These types mirror the Yahoo Finance chart API responses and are converted
//! to ticker-core types for use in the application.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use ticker_core::{DataSource, PriceQuote, Symbol};

/// Base URL for the public chart API (no auth required)
pub const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";

/// Top-level envelope of `/v8/finance/chart/{symbol}`
#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ChartError {
    /// Yahoo reports unknown or delisted symbols with this code
    pub fn is_not_found(&self) -> bool {
        self.code.eq_ignore_ascii_case("Not Found")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
}

/// Quote metadata attached to every chart result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    #[serde(default)]
    pub symbol: Option<String>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub regular_market_price: Option<f64>,

    #[serde(default)]
    pub regular_market_volume: Option<f64>,

    #[serde(default)]
    pub chart_previous_close: Option<f64>,

    #[serde(default)]
    pub previous_close: Option<f64>,

    /// Unix seconds of the last regular-session trade
    #[serde(default)]
    pub regular_market_time: Option<i64>,
}

impl ChartMeta {
    /// Convert to a core quote, or `None` when Yahoo has no usable price
    pub fn to_price_quote(&self, symbol: &Symbol) -> Option<PriceQuote> {
        let price = self.regular_market_price.filter(|p| p.is_finite())?;

        let timestamp = self
            .regular_market_time
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        Some(PriceQuote {
            symbol: symbol.clone(),
            price,
            volume: self.regular_market_volume.unwrap_or(0.0),
            previous_close: self.previous_close.or(self.chart_previous_close),
            source: DataSource::Yahoo,
            timestamp,
        })
    }
}
