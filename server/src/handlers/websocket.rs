//! WebSocket handler for real-time generation events.
//!
//! Registers the connection under its user id, forwards published events to
//! the socket, and drains whatever the client sends.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use genwave_engine::Message;
use tokio::sync::mpsc;

use crate::websocket::ConnectionManager;

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the connection with the manager
/// 2. Spawns a task to forward outgoing events
/// 3. Reads incoming frames until the client leaves
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(
    socket: WebSocket,
    conn_manager: Arc<ConnectionManager>,
    user_id: String,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = conn_manager.register(user_id.clone(), tx);

    tracing::info!(
        conn_id = %conn_id,
        user_id = %user_id,
        "WebSocket client connected"
    );

    // Forward events until the manager drops the sender, then say goodbye
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg.encode() {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(WsMessage::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
        let _ = ws_sender.send(WsMessage::Close(None)).await;
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(WsMessage::Text(text)) => match Message::decode(text.as_str()) {
                Ok(msg) => tracing::debug!(
                    conn_id = %conn_id,
                    kind = %msg.kind(),
                    "Client message received"
                ),
                Err(e) => tracing::debug!(conn_id = %conn_id, "Ignoring client frame: {}", e),
            },
            Ok(WsMessage::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(WsMessage::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(WsMessage::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(WsMessage::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    // Clean up
    conn_manager.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        user_id = %user_id,
        active_connections = conn_manager.connection_count(),
        "WebSocket client disconnected"
    );
}
