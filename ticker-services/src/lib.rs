//! Business logic services for the Ticker price-stream backend
//!
//! This crate wires the provider clients into a fallback quote service,
//! runs the periodic price feed, and owns the WebSocket connection registry.

pub mod market_data;
pub mod price_feed;
pub mod price_source;
pub mod websocket;

pub use market_data::{MarketDataService, SymbolCatalog};
pub use price_feed::{PriceFeed, PriceFeedConfig, TickReport, DEFAULT_WATCH_LIST};
pub use price_source::PriceSource;
pub use websocket::{ConnectionId, ConnectionRegistry, PriceStreamHub};
