//! Server configuration
//!
//! Everything is read from environment variables; `.env` is loaded by
//! `main` before this runs.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use ticker_services::PriceFeedConfig;

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    /// Alpha Vantage API key (`demo` when unset)
    pub alpha_vantage_key: Option<String>,
    pub yahoo_base_url: Option<String>,
    pub alpha_vantage_base_url: Option<String>,
    pub price_feed: PriceFeedConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            cors_origins: Vec::new(),
            alpha_vantage_key: None,
            yahoo_base_url: None,
            alpha_vantage_base_url: None,
            price_feed: PriceFeedConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    ///
    /// Recognised variables:
    /// - SERVER_HOST, SERVER_PORT: bind address (0.0.0.0:8000)
    /// - BACKEND_CORS_ORIGINS: comma list or JSON array of origins
    /// - WATCH_SYMBOLS: comma list of symbols polled by the price feed
    /// - PRICE_UPDATE_INTERVAL_SECS, PRICE_ERROR_BACKOFF_SECS, PRICE_FETCH_TIMEOUT_SECS
    /// - ALPHA_VANTAGE_KEY, YAHOO_BASE_URL, ALPHA_VANTAGE_BASE_URL
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(host) = var("SERVER_HOST") {
            config.host = host.parse().map_err(|_| ConfigError::InvalidValue {
                var: "SERVER_HOST".to_string(),
                value: host.clone(),
            })?;
        }

        if let Some(port) = var("SERVER_PORT") {
            config.port = parse_number("SERVER_PORT", &port)?;
        }

        if let Some(origins) = var("BACKEND_CORS_ORIGINS") {
            config.cors_origins = parse_origins(&origins)?;
        }

        if let Some(symbols) = var("WATCH_SYMBOLS") {
            config.price_feed = config.price_feed.with_watch_list(symbols.split(','));
            if config.price_feed.watch_list.is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: "WATCH_SYMBOLS".to_string(),
                    value: symbols,
                });
            }
        }

        if let Some(secs) = var("PRICE_UPDATE_INTERVAL_SECS") {
            config.price_feed.update_interval = parse_secs("PRICE_UPDATE_INTERVAL_SECS", &secs)?;
        }

        if let Some(secs) = var("PRICE_ERROR_BACKOFF_SECS") {
            config.price_feed.error_backoff = parse_secs("PRICE_ERROR_BACKOFF_SECS", &secs)?;
        }

        if let Some(secs) = var("PRICE_FETCH_TIMEOUT_SECS") {
            config.price_feed.fetch_timeout = parse_secs("PRICE_FETCH_TIMEOUT_SECS", &secs)?;
        }

        // A fetch may never outlive a tick
        config.price_feed.fetch_timeout = config
            .price_feed
            .fetch_timeout
            .min(config.price_feed.update_interval);

        config.alpha_vantage_key = var("ALPHA_VANTAGE_KEY");
        config.yahoo_base_url = var("YAHOO_BASE_URL");
        config.alpha_vantage_base_url = var("ALPHA_VANTAGE_BASE_URL");

        Ok(config)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Parse a whole number of seconds; zero is rejected
fn parse_secs(var: &str, value: &str) -> Result<Duration, ConfigError> {
    match parse_number::<u64>(var, value)? {
        0 => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidJson {
            field: "BACKEND_CORS_ORIGINS".to_string(),
            error: e.to_string(),
        })?
    } else {
        raw.split(',').map(str::to_string).collect()
    };

    Ok(origins
        .into_iter()
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },

    #[error("Invalid JSON in {field}: {error}")]
    InvalidJson { field: String, error: String },
}
