//! Event publishing routes.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::auth::Publisher;
use crate::error::Result;
use crate::handlers::{handle_broadcast, handle_publish};
use crate::websocket::PublishResponse;
use crate::AppState;

/// Create event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(broadcast_handler))
        .route("/events/{user_id}", post(publish_handler))
}

/// POST /events/{user_id} - Push one event to a user's connections.
async fn publish_handler(
    State(state): State<AppState>,
    _publisher: Publisher,
    Path(user_id): Path<String>,
    body: String,
) -> Result<Json<PublishResponse>> {
    let response = handle_publish(&state.conn_manager, &user_id, &body)?;
    Ok(Json(response))
}

/// POST /events - Push one event to every connection.
async fn broadcast_handler(
    State(state): State<AppState>,
    _publisher: Publisher,
    body: String,
) -> Result<Json<PublishResponse>> {
    let response = handle_broadcast(&state.conn_manager, &body)?;
    Ok(Json(response))
}
