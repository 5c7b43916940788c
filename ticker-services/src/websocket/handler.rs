//! WebSocket connection handler
//!
//! Drives a single client socket: registers it, forwards queued server
//! messages to the wire, and dispatches incoming client messages.

use futures_util::{SinkExt, StreamExt};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use ticker_core::{ClientMessage, ConnectionStats, ErrorCode, ServerMessage, Symbol};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, warn};

use super::registry::{ConnectionId, ConnectionRegistry, OUTBOUND_BUFFER};

/// Shared state for WebSocket handlers
#[derive(Clone)]
pub struct PriceStreamHub {
    registry: Arc<ConnectionRegistry>,
}

impl PriceStreamHub {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Statistics for the HTTP stats endpoint
    pub fn stats(&self, is_running: bool) -> ConnectionStats {
        self.registry.stats(is_running)
    }

    /// Register a connection and return the receiving end of its queue
    pub fn open_connection(
        &self,
        user_id: Option<String>,
    ) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);
        let id = self.registry.connect(outgoing_tx, user_id);
        (id, outgoing_rx)
    }

    /// Handle a WebSocket connection until either side closes it
    ///
    /// This is called when a WebSocket upgrade is successful.
    pub async fn serve_connection<S>(&self, socket: S, user_id: Option<String>)
    where
        S: futures_util::Stream<Item = Result<Message, WsError>>
            + futures_util::Sink<Message, Error = WsError>
            + Send
            + 'static,
    {
        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (id, mut outgoing_rx) = self.open_connection(user_id);

        // Task: Send outgoing messages to WebSocket
        let mut send_task = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(e) => {
                        error!("Failed to serialize {} message: {}", message.kind(), e);
                        continue;
                    }
                };

                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        // Task: Receive and process incoming messages
        let recv_task = async {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => self.handle_text_guarded(id, text.as_str()),
                    Ok(Message::Binary(_)) => {
                        self.registry.send_to_one(
                            id,
                            ServerMessage::error(
                                ErrorCode::InvalidMessage,
                                "Binary messages not supported",
                            ),
                        );
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Received close from {}", id);
                        break;
                    }
                    Ok(_) => {
                        // Ping/pong frames are answered by tungstenite
                    }
                    Err(e) => {
                        debug!("WebSocket error for {}: {}", id, e);
                        break;
                    }
                }
            }
        };

        // Wait for either side to finish (connection closed)
        tokio::select! {
            _ = &mut send_task => {}
            _ = recv_task => {}
        }

        self.registry.disconnect(id);
        send_task.abort();
    }

    /// Decode a text frame and dispatch it, answering decode failures
    pub fn handle_text(&self, id: ConnectionId, text: &str) {
        match ClientMessage::from_json(text) {
            Ok(message) => self.dispatch(id, message),
            Err(e) => {
                debug!("Invalid message from {}: {}", id, e);
                self.registry.send_to_one(
                    id,
                    ServerMessage::error(
                        ErrorCode::InvalidMessage,
                        format!("Invalid JSON message: {}", e),
                    ),
                );
            }
        }
    }

    /// Same as [`handle_text`](Self::handle_text), but a fault while
    /// handling one frame never tears down the connection
    fn handle_text_guarded(&self, id: ConnectionId, text: &str) {
        if catch_unwind(AssertUnwindSafe(|| self.handle_text(id, text))).is_err() {
            error!("Error handling WebSocket message from {}", id);
            self.registry.send_to_one(
                id,
                ServerMessage::error(ErrorCode::InternalError, "Failed to handle message"),
            );
        }
    }

    /// Handle a decoded client message
    pub fn dispatch(&self, id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Subscribe { symbol } => {
                match symbol.as_deref().and_then(Symbol::parse) {
                    Some(symbol) => {
                        self.registry.subscribe(id, symbol);
                    }
                    None => {
                        self.registry.send_to_one(
                            id,
                            ServerMessage::error(
                                ErrorCode::InvalidMessage,
                                "subscribe requires a symbol",
                            ),
                        );
                    }
                }
            }
            ClientMessage::Ping => {
                self.registry.send_to_one(id, ServerMessage::pong());
            }
            ClientMessage::Unknown { kind } => {
                warn!("Unknown message type from {}: {}", id, kind);
                self.registry.send_to_one(
                    id,
                    ServerMessage::error(
                        ErrorCode::UnknownType,
                        format!("Unknown message type: {}", kind),
                    ),
                );
            }
        }
    }
}

impl std::fmt::Debug for PriceStreamHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceStreamHub")
            .field("registry", &self.registry)
            .finish()
    }
}
