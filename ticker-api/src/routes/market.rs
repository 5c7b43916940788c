//! Market data API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use ticker_core::{ConnectionStats, PriceQuote, Symbol};
use tracing::{error, info};

use crate::AppState;

/// Response for a single quote
#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub success: bool,
    #[serde(flatten)]
    pub quote: PriceQuote,
}

/// Supported symbols by asset class
#[derive(Debug, Serialize)]
pub struct SymbolGroups {
    pub crypto: Vec<&'static str>,
    pub forex: Vec<&'static str>,
    pub stocks: Vec<&'static str>,
}

/// Response for the symbol catalogue
#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub success: bool,
    pub symbols: SymbolGroups,
    pub total_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Response for WebSocket statistics
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub data: ConnectionStats,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
            status_code: status.as_u16(),
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

/// Create market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/price/{symbol}", get(get_price))
        .route("/symbols", get(get_symbols))
        .route("/websocket/stats", get(websocket_stats))
}

/// Get the current quote for a symbol
async fn get_price(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Some(symbol) = Symbol::parse(&raw) else {
        return error_response(StatusCode::BAD_REQUEST, "Symbol is required");
    };

    info!("Getting price for {}", symbol);

    match state.market_data.get_quote(&symbol).await {
        Ok(Some(quote)) => (
            StatusCode::OK,
            Json(PriceResponse {
                success: true,
                quote,
            }),
        )
            .into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Price data not available for {}", symbol),
        ),
        Err(e) => {
            error!("Real-time price fetch failed for {}: {}", symbol, e);
            error_response(StatusCode::BAD_GATEWAY, format!("Price fetch failed: {}", e))
        }
    }
}

/// List supported symbols
async fn get_symbols(State(state): State<AppState>) -> Json<SymbolsResponse> {
    let catalog = state.market_data.supported_symbols();

    Json(SymbolsResponse {
        success: true,
        total_count: catalog.total_count,
        symbols: SymbolGroups {
            crypto: catalog.crypto,
            forex: catalog.forex,
            stocks: catalog.stocks,
        },
        timestamp: Utc::now(),
    })
}

/// Get WebSocket connection statistics
async fn websocket_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        data: state.hub.stats(state.feed.is_running()),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use crate::routes::{app, test_support};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_get_price() {
        let (status, json) = get_json(app(test_support::state()), "/api/v1/price/aapl").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["price"], 100.0);
        assert_eq!(json["previous_close"], 95.0);
        assert_eq!(json["source"], "yahoo");
    }

    #[tokio::test]
    async fn test_get_price_unavailable() {
        let (status, json) = get_json(app(test_support::state()), "/api/v1/price/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["status_code"], 404);
        assert_eq!(json["error"], "Price data not available for NOPE");
    }

    #[tokio::test]
    async fn test_get_price_source_failure() {
        let (status, json) = get_json(app(test_support::state()), "/api/v1/price/FAIL").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Price fetch failed"));
    }

    #[tokio::test]
    async fn test_get_symbols() {
        let (status, json) = get_json(app(test_support::state()), "/api/v1/symbols").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_count"], 30);
        assert_eq!(json["symbols"]["crypto"][0], "BTC-USD");
        assert_eq!(json["symbols"]["stocks"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_websocket_stats() {
        let state = test_support::state();
        let (tx, _rx) = mpsc::channel(8);
        state
            .hub
            .registry()
            .connect(tx, Some("alice".to_string()));

        let (status, json) = get_json(app(state), "/api/v1/websocket/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["total_connections"], 1);
        assert_eq!(json["data"]["total_users"], 1);
        assert_eq!(json["data"]["is_running"], false);
        assert!(json["timestamp"].is_string());
    }
}
