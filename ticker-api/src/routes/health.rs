//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    price_feed_running: bool,
    total_connections: usize,
    timestamp: DateTime<Utc>,
}

/// Health check handler
///
/// Degraded while the price feed is not running.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let running = state.feed.is_running();

    let response = HealthResponse {
        status: if running { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        price_feed_running: running,
        total_connections: state.hub.registry().connection_count(),
        timestamp: Utc::now(),
    };

    let code = if running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
