//! Publish handlers - route generation events to connected clients.

use genwave_engine::Message;

use crate::error::{AppError, Result};
use crate::websocket::{ConnectionManager, PublishResponse};

/// Validate a raw event body with the same decoder clients use.
pub fn parse_event(body: &str) -> Result<Message> {
    Ok(Message::decode(body)?)
}

/// Deliver an event to every connection of `user_id`.
pub fn handle_publish(
    conn_manager: &ConnectionManager,
    user_id: &str,
    body: &str,
) -> Result<PublishResponse> {
    if user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user_id must not be empty".to_string()));
    }

    let message = parse_event(body)?;
    let kind = message.kind();
    let delivered = conn_manager.send_to_user(user_id, message);

    tracing::info!(user_id = %user_id, kind = %kind, delivered, "Published event");

    Ok(PublishResponse { delivered })
}

/// Deliver an event to every connection.
pub fn handle_broadcast(conn_manager: &ConnectionManager, body: &str) -> Result<PublishResponse> {
    let message = parse_event(body)?;
    let kind = message.kind();
    let delivered = conn_manager.broadcast_all(message);

    tracing::info!(kind = %kind, delivered, "Broadcast event");

    Ok(PublishResponse { delivered })
}
