//! Connection status reported to observers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an [`UpdateClient`](crate::UpdateClient).
///
/// Exactly one status is active at a time. `Error` is emitted transiently on
/// transport failures and is always followed by `Reconnecting` or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
    Error,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionStatus::Open)
    }

    /// Whether a transport connection is being established or is established.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting | ConnectionStatus::Open)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ConnectionStatus::Reconnecting).unwrap();
        assert_eq!(json, r#""reconnecting""#);

        let status: ConnectionStatus = serde_json::from_str(r#""open""#).unwrap();
        assert_eq!(status, ConnectionStatus::Open);
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
        assert!(ConnectionStatus::Open.is_open());
        assert!(ConnectionStatus::Connecting.is_live());
        assert!(!ConnectionStatus::Reconnecting.is_live());
    }
}
