//! WebSocket infrastructure for the live price stream
//!
//! This module provides the connection registry and the per-socket
//! handler used by the API server.

mod handler;
mod registry;

pub use handler::PriceStreamHub;
pub use registry::{ConnectionId, ConnectionRegistry, Outbound, OUTBOUND_BUFFER};
