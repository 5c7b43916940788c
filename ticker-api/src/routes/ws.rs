//! WebSocket route handler
//!
//! Upgrades `/ws` requests and hands the socket to the price stream hub.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::channel::mpsc;
use futures_util::{stream::BoxStream, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use ticker_services::websocket::OUTBOUND_BUFFER;
use tokio_tungstenite::tungstenite::{self, Error as WsError};
use tracing::info;

use crate::AppState;

/// Query parameters for the upgrade request
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Optional user identifier for grouping connections
    pub user_id: Option<String>,
}

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_id = query.user_id.filter(|u| !u.trim().is_empty());
    info!("WebSocket upgrade request received (user: {:?})", user_id);
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Option<String>) {
    let (mut sender, receiver) = socket.split();

    let incoming = receiver
        .map(|frame| {
            frame
                .map(to_tungstenite)
                .map_err(|e| WsError::Io(std::io::Error::other(e)))
        })
        .boxed();
    let (bridge, mut outgoing_rx) = BridgeStream::new(incoming);

    // Task: Forward handler output to the axum socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.next().await {
            let Some(msg) = to_axum(msg) else { continue };
            if sender.send(msg).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    state.hub.serve_connection(bridge, user_id).await;

    send_task.abort();
}

fn to_tungstenite(msg: Message) -> tungstenite::Message {
    match msg {
        Message::Text(text) => tungstenite::Message::Text(text.to_string().into()),
        Message::Binary(data) => tungstenite::Message::Binary(data.to_vec().into()),
        Message::Ping(data) => tungstenite::Message::Ping(data.to_vec().into()),
        Message::Pong(data) => tungstenite::Message::Pong(data.to_vec().into()),
        Message::Close(_) => tungstenite::Message::Close(None),
    }
}

fn to_axum(msg: tungstenite::Message) -> Option<Message> {
    match msg {
        tungstenite::Message::Text(text) => Some(Message::Text(text.to_string().into())),
        tungstenite::Message::Binary(data) => Some(Message::Binary(data.to_vec().into())),
        tungstenite::Message::Ping(data) => Some(Message::Ping(data.to_vec().into())),
        tungstenite::Message::Pong(data) => Some(Message::Pong(data.to_vec().into())),
        tungstenite::Message::Close(_) | tungstenite::Message::Frame(_) => None,
    }
}

/// Adapts an axum socket to the tungstenite stream/sink the hub drives
///
/// The sink side is a bounded channel, so a client that stops reading
/// stalls the hub's writer and its outbound queue fills up instead of
/// buffering without limit.
struct BridgeStream {
    incoming: BoxStream<'static, Result<tungstenite::Message, WsError>>,
    outgoing: mpsc::Sender<tungstenite::Message>,
}

impl BridgeStream {
    fn new(
        incoming: BoxStream<'static, Result<tungstenite::Message, WsError>>,
    ) -> (Self, mpsc::Receiver<tungstenite::Message>) {
        let (outgoing, outgoing_rx) = mpsc::channel(OUTBOUND_BUFFER);
        (Self { incoming, outgoing }, outgoing_rx)
    }
}

impl Stream for BridgeStream {
    type Item = Result<tungstenite::Message, WsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.incoming.poll_next_unpin(cx)
    }
}

impl futures_util::Sink<tungstenite::Message> for BridgeStream {
    type Error = WsError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.outgoing
            .poll_ready(cx)
            .map_err(|_| WsError::ConnectionClosed)
    }

    fn start_send(mut self: Pin<&mut Self>, item: tungstenite::Message) -> Result<(), Self::Error> {
        self.outgoing
            .start_send(item)
            .map_err(|_| WsError::ConnectionClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.outgoing.close_channel();
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{app, test_support};
    use std::time::Duration;
    use tokio_tungstenite::connect_async;

    #[tokio::test]
    async fn test_bridge_applies_backpressure() {
        let (mut bridge, mut outgoing_rx) = BridgeStream::new(futures_util::stream::empty().boxed());

        let mut accepted = 0;
        loop {
            let frame = tungstenite::Message::Text(format!("frame {}", accepted).into());
            match tokio::time::timeout(Duration::from_millis(50), bridge.send(frame)).await {
                Ok(result) => {
                    result.unwrap();
                    accepted += 1;
                    assert!(accepted <= OUTBOUND_BUFFER + 1, "bridge never filled up");
                }
                Err(_) => break,
            }
        }
        assert!(accepted >= OUTBOUND_BUFFER);

        // Draining one frame frees room for the next send
        assert!(outgoing_rx.next().await.is_some());
        tokio::time::timeout(
            Duration::from_millis(50),
            bridge.send(tungstenite::Message::Text("late".into())),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn test_bridge_send_fails_once_socket_is_gone() {
        let (mut bridge, outgoing_rx) = BridgeStream::new(futures_util::stream::empty().boxed());
        drop(outgoing_rx);

        let result = bridge.send(tungstenite::Message::Text("orphan".into())).await;
        assert!(matches!(result, Err(WsError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_upgrade_registers_connection() {
        let state = test_support::state();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(state.clone());
        tokio::spawn(async move { axum::serve(listener, router).await });

        let (mut socket, _) = connect_async(format!("ws://{}/ws?user_id=alice", addr))
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = frame.into_text().unwrap();
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["type"], "connection_established");

        let registry = state.hub.registry();
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.user_connection_count("alice"), 1);

        socket.close(None).await.unwrap();
        for _ in 0..100 {
            if registry.connection_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.connection_count(), 0);
    }
}
