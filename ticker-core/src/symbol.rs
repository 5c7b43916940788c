//! Trading symbol identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// An uppercase-normalized trading symbol such as `BTC-USD` or `AAPL`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Normalize raw client or config input into a symbol
    ///
    /// Returns `None` when nothing but whitespace is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s).ok_or_else(|| "Symbol cannot be empty".to_string())
    }
}

impl TryFrom<String> for Symbol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let symbol = Symbol::parse("  btc-usd ").unwrap();
        assert_eq!(symbol.as_str(), "BTC-USD");
        assert_eq!(symbol, Symbol::parse("BTC-USD").unwrap());
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(Symbol::parse("").is_none());
        assert!(Symbol::parse("   ").is_none());
    }

    #[test]
    fn test_deserialize_normalizes() {
        let symbol: Symbol = serde_json::from_str("\"aapl\"").unwrap();
        assert_eq!(symbol.to_string(), "AAPL");
        assert!(serde_json::from_str::<Symbol>("\"\"").is_err());
    }
}
