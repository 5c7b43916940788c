//! Core types for the Ticker price-stream backend
//!
//! This crate defines the shared data structures used across the backend,
//! including symbols, price snapshots, data sources and the WebSocket
//! protocol spoken with frontend clients.

pub mod error;
pub mod price;
pub mod source;
pub mod symbol;
pub mod websocket;

pub use error::{TickerError, TickerResult};
pub use price::{percent_change, PriceQuote, SymbolPriceState};
pub use source::DataSource;
pub use symbol::Symbol;
pub use websocket::{ClientMessage, ConnectionStats, ErrorCode, ServerMessage};
