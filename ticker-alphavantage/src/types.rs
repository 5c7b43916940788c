//! Alpha Vantage API response types
//!
//! Alpha Vantage returns every number as a string keyed by a numbered label
//! (`"05. price"`). These types capture the raw payloads and convert them
//! to ticker-core quotes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use ticker_core::{DataSource, PriceQuote, Symbol};

/// Base URL for the Alpha Vantage query API
pub const ALPHA_VANTAGE_API_BASE: &str = "https://www.alphavantage.co";

/// Key used when no API key is configured (rate limited, IBM-only)
pub const DEMO_API_KEY: &str = "demo";

/// Envelope shared by all query functions
///
/// Alpha Vantage answers `200 OK` even for failures; the failure kind is
/// signalled by which top-level key is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryEnvelope {
    #[serde(rename = "Global Quote", default)]
    pub global_quote: Option<GlobalQuote>,

    #[serde(rename = "Realtime Currency Exchange Rate", default)]
    pub exchange_rate: Option<ExchangeRate>,

    /// Rate-limit notice
    #[serde(rename = "Note", default)]
    pub note: Option<String>,

    /// Premium-endpoint or rate-limit notice
    #[serde(rename = "Information", default)]
    pub information: Option<String>,

    /// Invalid symbol or malformed call
    #[serde(rename = "Error Message", default)]
    pub error_message: Option<String>,
}

/// `GLOBAL_QUOTE` payload (empty object for unknown symbols)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalQuote {
    #[serde(rename = "01. symbol", default)]
    pub symbol: Option<String>,

    #[serde(rename = "05. price", default)]
    pub price: Option<String>,

    #[serde(rename = "06. volume", default)]
    pub volume: Option<String>,

    #[serde(rename = "07. latest trading day", default)]
    pub latest_trading_day: Option<String>,

    #[serde(rename = "08. previous close", default)]
    pub previous_close: Option<String>,
}

impl GlobalQuote {
    pub fn to_price_quote(&self, symbol: &Symbol) -> Option<PriceQuote> {
        let price = parse_number(self.price.as_deref())?;

        let timestamp = self
            .latest_trading_day
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);

        Some(PriceQuote {
            symbol: symbol.clone(),
            price,
            volume: parse_number(self.volume.as_deref()).unwrap_or(0.0),
            previous_close: parse_number(self.previous_close.as_deref()),
            source: DataSource::AlphaVantage,
            timestamp,
        })
    }
}

/// `CURRENCY_EXCHANGE_RATE` payload, used for `BASE-QUOTE` pairs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeRate {
    #[serde(rename = "5. Exchange Rate", default)]
    pub rate: Option<String>,

    #[serde(rename = "6. Last Refreshed", default)]
    pub last_refreshed: Option<String>,
}

impl ExchangeRate {
    pub fn to_price_quote(&self, symbol: &Symbol) -> Option<PriceQuote> {
        let price = parse_number(self.rate.as_deref())?;

        let timestamp: DateTime<Utc> = self
            .last_refreshed
            .as_deref()
            .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S").ok())
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);

        Some(PriceQuote {
            symbol: symbol.clone(),
            price,
            volume: 0.0,
            previous_close: None,
            source: DataSource::AlphaVantage,
            timestamp,
        })
    }
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Split `BTC-USD` style pairs into their currencies
///
/// The quote side must be a three-letter currency code, so share classes
/// such as `BRK-B` stay equities.
pub fn currency_pair(symbol: &Symbol) -> Option<(&str, &str)> {
    let (from, to) = symbol.as_str().split_once('-')?;
    if from.is_empty() || to.len() != 3 {
        return None;
    }
    Some((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_quote() {
        let json = r#"{
            "Global Quote": {
                "01. symbol": "MSFT",
                "02. open": "415.0000",
                "05. price": "417.2500",
                "06. volume": "18234567",
                "07. latest trading day": "2024-05-31",
                "08. previous close": "414.1000",
                "09. change": "3.1500",
                "10. change percent": "0.7607%"
            }
        }"#;

        let envelope: QueryEnvelope = serde_json::from_str(json).unwrap();
        let symbol = Symbol::parse("msft").unwrap();
        let quote = envelope.global_quote.unwrap().to_price_quote(&symbol).unwrap();

        assert_eq!(quote.price, 417.25);
        assert_eq!(quote.volume, 18234567.0);
        assert_eq!(quote.previous_close, Some(414.1));
        assert_eq!(quote.source, DataSource::AlphaVantage);
        assert_eq!(quote.timestamp.to_rfc3339(), "2024-05-31T00:00:00+00:00");
    }

    #[test]
    fn test_empty_global_quote_is_unavailable() {
        let envelope: QueryEnvelope = serde_json::from_str(r#"{"Global Quote": {}}"#).unwrap();
        let symbol = Symbol::parse("NOPE").unwrap();
        assert!(envelope.global_quote.unwrap().to_price_quote(&symbol).is_none());
    }

    #[test]
    fn test_parse_exchange_rate() {
        let json = r#"{
            "Realtime Currency Exchange Rate": {
                "1. From_Currency Code": "BTC",
                "3. To_Currency Code": "USD",
                "5. Exchange Rate": "67010.55000000",
                "6. Last Refreshed": "2024-05-31 12:30:01"
            }
        }"#;

        let envelope: QueryEnvelope = serde_json::from_str(json).unwrap();
        let symbol = Symbol::parse("BTC-USD").unwrap();
        let quote = envelope.exchange_rate.unwrap().to_price_quote(&symbol).unwrap();
        assert_eq!(quote.price, 67010.55);
        assert_eq!(quote.volume, 0.0);
        assert!(quote.previous_close.is_none());
    }

    #[test]
    fn test_currency_pair() {
        let pair = Symbol::parse("eth-usd").unwrap();
        assert_eq!(currency_pair(&pair), Some(("ETH", "USD")));
        assert_eq!(currency_pair(&Symbol::parse("AAPL").unwrap()), None);
        assert_eq!(currency_pair(&Symbol::parse("-USD").unwrap()), None);
        assert_eq!(currency_pair(&Symbol::parse("BRK-B").unwrap()), None);
    }
}
