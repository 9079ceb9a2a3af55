//! Error handling for the client runtime.

use crate::config::ConfigError;

/// Client runtime error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Engine error: {0}")]
    Engine(#[from] genwave_engine::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No Tokio runtime available; spawn the client from within a runtime")]
    NoRuntime,
}

/// Result type alias for the client runtime.
pub type Result<T> = std::result::Result<T, ClientError>;
