//! Ticker API Server
//!
//! HTTP and WebSocket server that streams live prices to connected clients.

mod config;
mod routes;

use axum::http::{header, HeaderValue, Method};
use std::sync::Arc;
use ticker_alphavantage::AlphaVantageClient;
use ticker_services::{
    ConnectionRegistry, MarketDataService, PriceFeed, PriceSource, PriceStreamHub,
};
use ticker_yahoo::YahooClient;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ApiConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: PriceStreamHub,
    pub feed: Arc<PriceFeed>,
    pub market_data: Arc<MarketDataService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if the file doesn't exist
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ticker_api=debug")),
        )
        .init();

    info!("Starting Ticker API");

    let config = ApiConfig::from_env()?;

    // Initialize clients
    let yahoo = match &config.yahoo_base_url {
        Some(url) => YahooClient::with_base_url(url.as_str()),
        None => YahooClient::new(),
    };
    let alpha_vantage = match &config.alpha_vantage_base_url {
        Some(url) => AlphaVantageClient::with_base_url(url.as_str(), config.alpha_vantage_key.clone()),
        None => AlphaVantageClient::new(config.alpha_vantage_key.clone()),
    };
    if alpha_vantage.is_demo() {
        info!("ALPHA_VANTAGE_KEY not set - Alpha Vantage fallback uses the demo key");
    }

    let market_data = Arc::new(MarketDataService::new(yahoo, alpha_vantage));
    info!("Price sources: {:?}", market_data.source_names());

    // Registry is shared between the feed and every socket handler
    let registry = Arc::new(ConnectionRegistry::new());
    let hub = PriceStreamHub::new(Arc::clone(&registry));

    let feed_source: Arc<dyn PriceSource> = market_data.clone();
    let feed = Arc::new(PriceFeed::new(
        registry,
        feed_source,
        config.price_feed.clone(),
    ));
    feed.start().await;

    let state = AppState {
        hub,
        feed: Arc::clone(&feed),
        market_data,
    };

    let app = routes::app(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr = config.bind_addr();
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    feed.stop().await;
    info!("Ticker API stopped");

    Ok(())
}

/// Configure CORS for the frontend
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
