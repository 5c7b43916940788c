//! Alpha Vantage API client
//!
//! Quote lookups via `GLOBAL_QUOTE` for equities and
//! `CURRENCY_EXCHANGE_RATE` for `BASE-QUOTE` currency pairs.

use crate::types::{currency_pair, QueryEnvelope, ALPHA_VANTAGE_API_BASE, DEMO_API_KEY};
use reqwest::Client;
use std::time::Duration;
use ticker_core::{PriceQuote, Symbol, TickerError, TickerResult};
use tracing::{debug, instrument, warn};

/// Alpha Vantage API client
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    /// Create a new client; `None` falls back to the public demo key
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(ALPHA_VANTAGE_API_BASE, api_key)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| DEMO_API_KEY.to_string());

        if api_key == DEMO_API_KEY {
            warn!("ALPHA_VANTAGE_KEY not set - using the rate-limited demo key");
        }

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Whether the client runs on the shared demo key
    pub fn is_demo(&self) -> bool {
        self.api_key == DEMO_API_KEY
    }

    /// Query parameters for a symbol's quote request
    fn quote_params(&self, symbol: &Symbol) -> Vec<(&'static str, String)> {
        match currency_pair(symbol) {
            Some((from, to)) => vec![
                ("function", "CURRENCY_EXCHANGE_RATE".to_string()),
                ("from_currency", from.to_string()),
                ("to_currency", to.to_string()),
                ("apikey", self.api_key.clone()),
            ],
            None => vec![
                ("function", "GLOBAL_QUOTE".to_string()),
                ("symbol", symbol.to_string()),
                ("apikey", self.api_key.clone()),
            ],
        }
    }

    /// Get the latest quote for a symbol
    ///
    /// Returns `Ok(None)` for symbols Alpha Vantage does not know.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn get_quote(&self, symbol: &Symbol) -> TickerResult<Option<PriceQuote>> {
        let url = format!("{}/query", self.base_url);
        debug!("Fetching Alpha Vantage quote for {}", symbol);

        let response = self
            .client
            .get(&url)
            .query(&self.quote_params(symbol))
            .send()
            .await
            .map_err(|e| {
                TickerError::network(format!("Failed to fetch Alpha Vantage quote: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TickerError::api(format!(
                "Alpha Vantage API error ({}): {}",
                status, body
            )));
        }

        let envelope: QueryEnvelope = response.json().await.map_err(|e| {
            TickerError::parse(format!("Failed to parse Alpha Vantage response: {}", e))
        })?;

        interpret_envelope(envelope, symbol)
    }
}

impl std::fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageClient")
            .field("base_url", &self.base_url)
            .field("demo", &self.is_demo())
            .finish()
    }
}

/// Map a decoded envelope onto the quote contract
pub(crate) fn interpret_envelope(
    envelope: QueryEnvelope,
    symbol: &Symbol,
) -> TickerResult<Option<PriceQuote>> {
    if let Some(note) = envelope.note.or(envelope.information) {
        return Err(TickerError::api(format!("Alpha Vantage notice: {}", note)));
    }

    if let Some(message) = envelope.error_message {
        debug!("Alpha Vantage rejected {}: {}", symbol, message);
        return Ok(None);
    }

    if let Some(rate) = envelope.exchange_rate {
        return Ok(rate.to_price_quote(symbol));
    }

    Ok(envelope
        .global_quote
        .and_then(|quote| quote.to_price_quote(symbol)))
}
