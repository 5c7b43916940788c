//! Market data source definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream providers that can produce a price quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Yahoo Finance chart API (crypto pairs and equities)
    Yahoo,
    /// Alpha Vantage quote endpoint (equities)
    AlphaVantage,
}

impl DataSource {
    /// Get the identifier used in payloads and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Yahoo => "yahoo",
            DataSource::AlphaVantage => "alpha_vantage",
        }
    }

    /// Get the full display name
    pub fn display_name(&self) -> &'static str {
        match self {
            DataSource::Yahoo => "Yahoo Finance",
            DataSource::AlphaVantage => "Alpha Vantage",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yahoo" | "yahoo_finance" | "yf" => Ok(DataSource::Yahoo),
            "alpha_vantage" | "alphavantage" | "av" => Ok(DataSource::AlphaVantage),
            _ => Err(format!("Unknown data source: {}", s)),
        }
    }
}
