//! Configuration management for the update client.

use std::env;
use std::time::Duration;

use genwave_engine::{Backoff, ClientOptions, OverflowPolicy, DEFAULT_OUTBOX_CAPACITY};

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Relay WebSocket endpoint
    pub ws_url: String,
    /// Identity sent as `user_id`
    pub user_id: String,
    pub auto_reconnect: bool,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
    /// Unset means retry forever
    pub max_reconnect_attempts: Option<u32>,
    pub outbox_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ws_url = lookup("GENWAVE_WS_URL").ok_or(ConfigError::MissingWsUrl)?;
        let user_id = lookup("GENWAVE_USER_ID").ok_or(ConfigError::MissingUserId)?;

        let auto_reconnect = match lookup("GENWAVE_AUTO_RECONNECT") {
            Some(value) => parse_bool("GENWAVE_AUTO_RECONNECT", &value)?,
            None => true,
        };

        let reconnect_base = Duration::from_millis(parse_or(
            &lookup,
            "GENWAVE_RECONNECT_BASE_MS",
            1000u64,
        )?);
        let reconnect_max = Duration::from_millis(parse_or(
            &lookup,
            "GENWAVE_RECONNECT_MAX_MS",
            30_000u64,
        )?);

        let max_reconnect_attempts = match lookup("GENWAVE_MAX_RECONNECT_ATTEMPTS") {
            Some(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                key: "GENWAVE_MAX_RECONNECT_ATTEMPTS",
                value,
            })?),
            None => None,
        };

        let outbox_capacity = parse_or(&lookup, "GENWAVE_OUTBOX_CAPACITY", DEFAULT_OUTBOX_CAPACITY)?;

        Ok(Self {
            ws_url,
            user_id,
            auto_reconnect,
            reconnect_base,
            reconnect_max,
            max_reconnect_attempts,
            outbox_capacity,
        })
    }

    /// Engine options for this configuration.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::new(self.ws_url.clone(), self.user_id.clone())
            .with_auto_reconnect(self.auto_reconnect)
            .with_backoff(Backoff::new(self.reconnect_base, self.reconnect_max))
            .with_outbox(self.outbox_capacity, OverflowPolicy::DropOldest)
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GENWAVE_WS_URL environment variable is required")]
    MissingWsUrl,

    #[error("GENWAVE_USER_ID environment variable is required")]
    MissingUserId,

    #[error("Invalid {key} value: {value}")]
    Invalid { key: &'static str, value: String },
}
