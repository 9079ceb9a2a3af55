//! WebSocket fan-out of generation events.
//!
//! Clients connect with their user id and receive every event published for
//! that user, plus broadcasts.

mod manager;
mod protocol;

pub use manager::{ConnectionManager, MessageSender};
pub use protocol::*;
