//! Error types for the ticker backend

use thiserror::Error;

/// Backend-wide error type
#[derive(Error, Debug)]
pub enum TickerError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TickerError {
    pub fn api(msg: impl Into<String>) -> Self {
        TickerError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        TickerError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        TickerError::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        TickerError::Config(msg.into())
    }
}

/// Result type alias for ticker operations
pub type TickerResult<T> = Result<T, TickerError>;
