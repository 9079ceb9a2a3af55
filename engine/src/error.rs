//! Error types for the Genwave engine.

use thiserror::Error;

/// Errors raised while configuring or driving an [`UpdateClient`](crate::UpdateClient).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Reasons an inbound payload was not accepted as a [`Message`](crate::Message).
///
/// These never leave the client: a payload that fails to decode is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Json(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing message type")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Failures reported by a [`Transport`](crate::Transport) when transmitting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection is not open")]
    NotConnected,

    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Other(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
