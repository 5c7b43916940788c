//! Yahoo Finance API client
//!
//! Provides quote lookups against the public chart endpoint. Yahoo covers
//! both crypto pairs (`BTC-USD`) and listed equities, which makes it the
//! primary source for the price stream.

use crate::types::{ChartResponse, YAHOO_API_BASE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use ticker_core::{PriceQuote, Symbol, TickerError, TickerResult};
use tracing::{debug, instrument};
use url::Url;

/// Yahoo rejects requests without a browser-like user agent
const USER_AGENT: &str = "Mozilla/5.0 (compatible; ticker/0.1)";

/// Yahoo Finance API client
#[derive(Clone, Debug)]
pub struct YahooClient {
    client: Client,
    base_url: String,
}

impl YahooClient {
    /// Create a new client against the public Yahoo endpoint
    pub fn new() -> Self {
        Self::with_base_url(YAHOO_API_BASE)
    }

    /// Create a client against a custom base URL (proxies, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the chart URL for a symbol, percent-encoding the path segment
    fn chart_url(&self, symbol: &Symbol) -> TickerResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TickerError::config(format!("Invalid Yahoo base URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| TickerError::config("Yahoo base URL cannot be a base"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol.as_str()]);

        url.query_pairs_mut()
            .append_pair("interval", "1d")
            .append_pair("range", "1d");

        Ok(url)
    }

    /// Get the latest quote for a symbol
    ///
    /// Returns `Ok(None)` when Yahoo does not know the symbol or has no
    /// regular-market price for it.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn get_quote(&self, symbol: &Symbol) -> TickerResult<Option<PriceQuote>> {
        let url = self.chart_url(symbol)?;
        debug!("Fetching Yahoo quote: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TickerError::network(format!("Failed to fetch Yahoo quote: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TickerError::network(format!("Failed to read Yahoo response: {}", e)))?;

        interpret_chart_response(status, &body, symbol)
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a raw chart response onto the quote contract
pub(crate) fn interpret_chart_response(
    status: StatusCode,
    body: &str,
    symbol: &Symbol,
) -> TickerResult<Option<PriceQuote>> {
    let parsed: Result<ChartResponse, _> = serde_json::from_str(body);

    match parsed {
        Ok(response) => {
            if let Some(error) = response.chart.error {
                if error.is_not_found() {
                    debug!("Yahoo has no data for {}", symbol);
                    return Ok(None);
                }
                return Err(TickerError::api(format!(
                    "Yahoo API error ({}): {}",
                    error.code,
                    error.description.unwrap_or_default()
                )));
            }

            if !status.is_success() {
                return Err(TickerError::api(format!("Yahoo API error ({})", status)));
            }

            Ok(response
                .chart
                .result
                .and_then(|results| results.into_iter().next())
                .and_then(|result| result.meta.to_price_quote(symbol)))
        }
        Err(_) if status == StatusCode::NOT_FOUND => Ok(None),
        Err(e) if status.is_success() => Err(TickerError::parse(format!(
            "Failed to parse Yahoo chart response: {}",
            e
        ))),
        Err(_) => Err(TickerError::api(format!(
            "Yahoo API error ({}): {}",
            status,
            body.chars().take(200).collect::<String>()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    #[test]
    fn test_chart_url() {
        let client = YahooClient::with_base_url("https://example.com/");
        let url = client.chart_url(&symbol("btc-usd")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/v8/finance/chart/BTC-USD?interval=1d&range=1d"
        );
    }

    #[test]
    fn test_interpret_success() {
        let body = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":101.5,"regularMarketVolume":42}}],"error":null}}"#;
        let quote = interpret_chart_response(StatusCode::OK, body, &symbol("aapl"))
            .unwrap()
            .unwrap();
        assert_eq!(quote.price, 101.5);
        assert_eq!(quote.volume, 42.0);
        assert_eq!(quote.symbol.as_str(), "AAPL");
    }

    #[test]
    fn test_interpret_not_found_is_unavailable() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let result = interpret_chart_response(StatusCode::NOT_FOUND, body, &symbol("NOPE"));
        assert!(matches!(result, Ok(None)));

        let result = interpret_chart_response(StatusCode::NOT_FOUND, "<html>", &symbol("NOPE"));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_interpret_server_error() {
        let result =
            interpret_chart_response(StatusCode::BAD_GATEWAY, "upstream down", &symbol("AAPL"));
        assert!(matches!(result, Err(TickerError::Api(_))));
    }

    #[test]
    fn test_interpret_garbage_success_body() {
        let result = interpret_chart_response(StatusCode::OK, "{}", &symbol("AAPL"));
        assert!(matches!(result, Err(TickerError::Parse(_))));
    }
}
