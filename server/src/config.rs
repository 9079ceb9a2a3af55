//! Configuration management for the relay.

use std::env;

/// Relay configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Bearer token required on publish endpoints. Unset allows anonymous publishing.
    pub api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let api_key = match env::var("API_KEY") {
            Ok(key) if key.trim().is_empty() => return Err(ConfigError::EmptyApiKey),
            Ok(key) => Some(key),
            Err(_) => None,
        };

        Ok(Self {
            host,
            port,
            api_key,
        })
    }

    /// Configuration for local development and tests: loopback, ephemeral port, no auth.
    pub fn local() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            api_key: None,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("API_KEY is set but empty")]
    EmptyApiKey,
}
