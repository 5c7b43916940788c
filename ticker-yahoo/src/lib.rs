//! Yahoo Finance integration for the Ticker price-stream backend
//!
//! This crate provides a client for the public Yahoo Finance chart API,
//! which serves quotes for crypto pairs and equities without authentication.

pub mod client;
pub mod types;

pub use client::YahooClient;
pub use types::{ChartMeta, ChartResponse, YAHOO_API_BASE};
