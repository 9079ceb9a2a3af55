//! Collaborator traits the client drives.
//!
//! The engine performs no IO. A runtime supplies a [`Transport`] for the
//! connection and a [`Timer`] for reconnect scheduling, and feeds their
//! notifications back through the `handle_*` methods of
//! [`UpdateClient`](crate::UpdateClient).

use std::time::Duration;

use url::Url;

use crate::error::TransportError;

/// A persistent bidirectional connection.
///
/// After `connect`, the runtime must report exactly the events the
/// connection produces: opened, message received, closed, error.
pub trait Transport {
    /// Begin establishing a connection to `url`, replacing any previous one.
    fn connect(&mut self, url: &Url);

    /// Transmit one text frame on the open connection.
    fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Tear down the current connection. Must be safe to call when none exists.
    fn close(&mut self);
}

/// One-shot timer for reconnect delays.
pub trait Timer {
    /// Arrange for the reconnect callback to fire after `delay`.
    fn schedule(&mut self, delay: Duration);

    /// Cancel the pending callback, if any.
    fn cancel(&mut self);
}
