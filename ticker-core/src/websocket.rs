//! WebSocket message types for the live price stream
//!
//! These types define the protocol for WebSocket communication between
//! the server and clients. Every frame is a JSON object tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Symbol, SymbolPriceState};

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Messages sent from client to server
///
/// Decoding is lenient: any JSON object is accepted and unrecognised `type`
/// values become [`ClientMessage::Unknown`] so they can be answered with an
/// error instead of failing the frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawClientMessage")]
pub enum ClientMessage {
    /// Subscribe to price updates for a symbol
    Subscribe {
        /// Raw symbol as sent by the client (normalized on dispatch)
        symbol: Option<String>,
    },
    /// Ping to keep connection alive
    Ping,
    /// Any other message type
    Unknown {
        /// The `type` value as received (`null` when absent)
        kind: String,
    },
}

impl ClientMessage {
    /// Decode a text frame
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Deserialize)]
struct RawClientMessage {
    #[serde(rename = "type", default)]
    kind: Option<serde_json::Value>,
    #[serde(default)]
    symbol: Option<serde_json::Value>,
}

impl From<RawClientMessage> for ClientMessage {
    fn from(raw: RawClientMessage) -> Self {
        let kind = match raw.kind {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => "null".to_string(),
        };

        match kind.as_str() {
            "subscribe" => ClientMessage::Subscribe {
                symbol: match raw.symbol {
                    Some(serde_json::Value::String(s)) => Some(s),
                    _ => None,
                },
            },
            "ping" => ClientMessage::Ping,
            _ => ClientMessage::Unknown { kind },
        }
    }
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once right after the connection is registered
    ConnectionEstablished {
        timestamp: DateTime<Utc>,
        message: String,
    },
    /// Subscription confirmed
    SubscriptionConfirmed { symbol: Symbol, message: String },
    /// Price update for a symbol
    PriceUpdate {
        symbol: Symbol,
        data: SymbolPriceState,
        timestamp: DateTime<Utc>,
    },
    /// Pong response to client ping
    Pong { timestamp: DateTime<Utc> },
    /// Error message
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    /// Connection acknowledgement stamped with the current time
    pub fn connection_established() -> Self {
        ServerMessage::ConnectionEstablished {
            timestamp: Utc::now(),
            message: "Connected to Ticker price stream".to_string(),
        }
    }

    pub fn subscription_confirmed(symbol: Symbol) -> Self {
        let message = format!("Subscribed to {} price updates", symbol);
        ServerMessage::SubscriptionConfirmed { symbol, message }
    }

    /// Price update carrying the snapshot's own timestamp
    pub fn price_update(state: SymbolPriceState) -> Self {
        ServerMessage::PriceUpdate {
            symbol: state.symbol.clone(),
            timestamp: state.timestamp,
            data: state,
        }
    }

    pub fn pong() -> Self {
        ServerMessage::Pong {
            timestamp: Utc::now(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }

    /// Replace the envelope timestamp on messages that carry one
    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        match &mut self {
            ServerMessage::ConnectionEstablished { timestamp, .. }
            | ServerMessage::PriceUpdate { timestamp, .. }
            | ServerMessage::Pong { timestamp } => *timestamp = ts,
            ServerMessage::SubscriptionConfirmed { .. } | ServerMessage::Error { .. } => {}
        }
        self
    }

    /// The `type` tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::ConnectionEstablished { .. } => "connection_established",
            ServerMessage::SubscriptionConfirmed { .. } => "subscription_confirmed",
            ServerMessage::PriceUpdate { .. } => "price_update",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Error codes for WebSocket errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be decoded, or required fields are missing
    InvalidMessage,
    /// Message `type` is not recognised
    UnknownType,
    /// Internal server error
    InternalError,
}

/// Connection statistics exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub is_running: bool,
    pub total_users: usize,
    pub cached_symbols: usize,
}
