//! Request handlers for the relay.

mod publish;
mod websocket;

pub use publish::*;
pub use websocket::*;
