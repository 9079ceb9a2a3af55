//! Relay protocol definitions.
//!
//! Frames pushed to clients are [`genwave_engine::Message`] values encoded as
//! JSON with a `type` discriminant. The HTTP side uses the types below.

use serde::{Deserialize, Serialize};

/// Query string of `GET /ws`.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Identity the connection is registered under
    pub user_id: String,
}

/// Response to a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Number of sockets the event was queued on
    pub delivered: usize,
}

/// Snapshot of the relay's connections, served by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub connections: usize,
    pub users: usize,
}
