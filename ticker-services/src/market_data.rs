//! Market data service for looking up quotes across providers

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use ticker_alphavantage::AlphaVantageClient;
use ticker_core::{PriceQuote, Symbol, TickerError, TickerResult};
use ticker_yahoo::YahooClient;
use tracing::{debug, instrument, warn};

use crate::price_source::PriceSource;

const CRYPTO_SYMBOLS: &[&str] = &[
    "BTC-USD", "ETH-USD", "ADA-USD", "SOL-USD", "DOGE-USD", "DOT-USD", "AVAX-USD", "MATIC-USD",
    "LINK-USD", "UNI-USD",
];

const FOREX_SYMBOLS: &[&str] = &[
    "EURUSD", "GBPUSD", "USDJPY", "USDCHF", "AUDUSD", "USDCAD", "NZDUSD", "EURGBP", "EURJPY",
    "GBPJPY",
];

const STOCK_SYMBOLS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "NVDA", "META", "NFLX", "ADBE", "CRM",
];

/// Supported symbols grouped by asset class
#[derive(Debug, Clone, Serialize)]
pub struct SymbolCatalog {
    pub crypto: Vec<&'static str>,
    pub forex: Vec<&'static str>,
    pub stocks: Vec<&'static str>,
    pub total_count: usize,
}

/// Service for fetching quotes with provider fallback
///
/// Providers are tried in order; the first one that returns a usable quote
/// wins. Yahoo comes first because it covers crypto pairs and equities,
/// Alpha Vantage is the fallback.
#[derive(Clone)]
pub struct MarketDataService {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl MarketDataService {
    /// Create a new market data service
    pub fn new(yahoo: YahooClient, alpha_vantage: AlphaVantageClient) -> Self {
        let yahoo: Arc<dyn PriceSource> = Arc::new(yahoo);
        let alpha_vantage: Arc<dyn PriceSource> = Arc::new(alpha_vantage);
        Self {
            sources: vec![yahoo, alpha_vantage],
        }
    }

    /// Create a service over an explicit provider chain
    pub fn with_sources(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self { sources }
    }

    /// Names of the providers in fallback order
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Symbols the frontend offers for lookup
    pub fn supported_symbols(&self) -> SymbolCatalog {
        SymbolCatalog {
            crypto: CRYPTO_SYMBOLS.to_vec(),
            forex: FOREX_SYMBOLS.to_vec(),
            stocks: STOCK_SYMBOLS.to_vec(),
            total_count: CRYPTO_SYMBOLS.len() + FOREX_SYMBOLS.len() + STOCK_SYMBOLS.len(),
        }
    }

    /// Get the current quote for a symbol from the first provider that has one
    ///
    /// Returns `Ok(None)` if at least one provider answered "unavailable" and
    /// none had a quote; returns the last error only when every provider failed.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn get_quote(&self, symbol: &Symbol) -> TickerResult<Option<PriceQuote>> {
        let mut last_error: Option<TickerError> = None;
        let mut any_answered = false;

        for source in &self.sources {
            match source.get_price(symbol).await {
                Ok(Some(quote)) if quote.is_valid() => {
                    debug!("Got {} quote from {}: {}", symbol, source.name(), quote.price);
                    return Ok(Some(quote));
                }
                Ok(Some(_)) => {
                    warn!("{} returned a non-finite price for {}", source.name(), symbol);
                    any_answered = true;
                }
                Ok(None) => {
                    debug!("{} has no quote for {}", source.name(), symbol);
                    any_answered = true;
                }
                Err(e) => {
                    warn!("{} quote for {} failed: {}", source.name(), symbol, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_answered => Err(e),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PriceSource for MarketDataService {
    async fn get_price(&self, symbol: &Symbol) -> TickerResult<Option<PriceQuote>> {
        self.get_quote(symbol).await
    }

    fn name(&self) -> &str {
        "market_data"
    }
}

impl std::fmt::Debug for MarketDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataService")
            .field("sources", &self.source_names())
            .finish()
    }
}
