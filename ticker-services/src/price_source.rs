//! Price source abstraction consumed by the broadcast loop
//!
//! A price source answers "what is the current price of this symbol?".
//! "Not found" is a normal answer (`Ok(None)`), never an error.

use async_trait::async_trait;
use ticker_alphavantage::AlphaVantageClient;
use ticker_core::{PriceQuote, Symbol, TickerResult};
use ticker_yahoo::YahooClient;

/// Anything that can produce a current quote for a symbol
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current quote
    ///
    /// Returns `Ok(None)` when the symbol is unknown or has no price right
    /// now, and `Err` for transport or provider failures.
    async fn get_price(&self, symbol: &Symbol) -> TickerResult<Option<PriceQuote>>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl PriceSource for YahooClient {
    async fn get_price(&self, symbol: &Symbol) -> TickerResult<Option<PriceQuote>> {
        self.get_quote(symbol).await
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[async_trait]
impl PriceSource for AlphaVantageClient {
    async fn get_price(&self, symbol: &Symbol) -> TickerResult<Option<PriceQuote>> {
        self.get_quote(symbol).await
    }

    fn name(&self) -> &str {
        "alpha_vantage"
    }
}
