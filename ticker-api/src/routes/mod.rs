//! API route definitions

mod health;
mod market;
pub mod ws;

use axum::Router;
use crate::AppState;

/// Create all `/api/v1` routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(market::routes())
        .merge(health::routes())
}

/// Create WebSocket routes (separate from API)
pub fn ws_routes() -> Router<AppState> {
    ws::routes()
}

/// Full application router without middleware
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .merge(ws_routes())
        .with_state(state)
}
