//! Alpha Vantage integration for the Ticker price-stream backend
//!
//! This crate provides a client for the Alpha Vantage query API. It is used
//! as the fallback quote source when Yahoo Finance has no data.
//!
//! Set `ALPHA_VANTAGE_KEY` to use a personal key; without it the shared
//! `demo` key is used, which only serves a handful of symbols.

pub mod client;
pub mod types;

pub use client::AlphaVantageClient;
pub use types::{QueryEnvelope, ALPHA_VANTAGE_API_BASE, DEMO_API_KEY};
