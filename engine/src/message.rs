//! Generation events exchanged with the relay.
//!
//! Every frame is a single JSON object discriminated by its `type` field.
//! Decoding checks the discriminant against the known set before building a
//! typed [`Message`], so unknown or malformed payloads never reach callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, Error, Result};

/// Identifier of a generation job. The backend uses integers, but string ids
/// are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Number(i64),
    Text(String),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Number(n) => write!(f, "{}", n),
            JobId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        JobId::Number(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId::Text(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        JobId::Text(id)
    }
}

/// A real-time generation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Job accepted and placed in the queue.
    GenerationStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<JobId>,
        position_in_queue: u32,
        /// Estimated seconds until completion
        eta: f64,
    },

    /// Periodic progress update.
    GenerationProgress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<JobId>,
        /// Percentage in `0..=100`
        progress: f64,
        stage: String,
        eta: f64,
    },

    /// Terminal success.
    GenerationCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<JobId>,
        audio_url: String,
        #[serde(default)]
        metadata: Value,
    },

    /// Terminal failure.
    GenerationFailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<JobId>,
        error: String,
        retry_available: bool,
    },

    /// Queue position change.
    QueueUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<JobId>,
        position: u32,
        total_queue_size: u32,
        eta: f64,
    },
}

/// The discriminant of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    GenerationStarted,
    GenerationProgress,
    GenerationCompleted,
    GenerationFailed,
    QueueUpdated,
}

impl MessageKind {
    /// All known kinds, in wire-table order.
    pub const ALL: [MessageKind; 5] = [
        MessageKind::GenerationStarted,
        MessageKind::GenerationProgress,
        MessageKind::GenerationCompleted,
        MessageKind::GenerationFailed,
        MessageKind::QueueUpdated,
    ];

    /// The wire value of the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::GenerationStarted => "generation_started",
            MessageKind::GenerationProgress => "generation_progress",
            MessageKind::GenerationCompleted => "generation_completed",
            MessageKind::GenerationFailed => "generation_failed",
            MessageKind::QueueUpdated => "queue_updated",
        }
    }

    /// Look up a kind by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    /// Decode a raw frame.
    ///
    /// The payload must be a JSON object whose `type` is one of the five known
    /// tags and whose fields match that variant. Extra fields are tolerated.
    pub fn decode(raw: &str) -> std::result::Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| DecodeError::Json(e.to_string()))?;

        let tag = value
            .as_object()
            .ok_or(DecodeError::NotAnObject)?
            .get("type")
            .ok_or(DecodeError::MissingType)?
            .as_str()
            .ok_or_else(|| DecodeError::InvalidField {
                field: "type",
                reason: "expected a string".to_string(),
            })?;

        if MessageKind::from_tag(tag).is_none() {
            return Err(DecodeError::UnknownType(tag.to_string()));
        }

        let message: Message =
            serde_json::from_value(value).map_err(|e| DecodeError::Json(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    /// Serialize to the canonical JSON form.
    ///
    /// Non-finite numbers are refused: JSON would carry them as `null`, which
    /// no peer decodes.
    pub fn encode(&self) -> Result<String> {
        if let Some((field, value)) = self.non_finite_field() {
            return Err(Error::Encode(format!("field '{}' is {}", field, value)));
        }
        serde_json::to_string(self).map_err(|e| Error::Encode(e.to_string()))
    }

    fn non_finite_field(&self) -> Option<(&'static str, f64)> {
        let (progress, eta) = match self {
            Message::GenerationStarted { eta, .. } | Message::QueueUpdated { eta, .. } => {
                (None, Some(*eta))
            }
            Message::GenerationProgress { progress, eta, .. } => (Some(*progress), Some(*eta)),
            Message::GenerationCompleted { .. } | Message::GenerationFailed { .. } => (None, None),
        };

        [("progress", progress), ("eta", eta)]
            .into_iter()
            .find_map(|(field, value)| value.filter(|v| !v.is_finite()).map(|v| (field, v)))
    }

    fn validate(&self) -> std::result::Result<(), DecodeError> {
        if let Message::GenerationProgress { progress, .. } = self {
            if !(0.0..=100.0).contains(progress) {
                return Err(DecodeError::InvalidField {
                    field: "progress",
                    reason: format!("{} is outside 0..=100", progress),
                });
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::GenerationStarted { .. } => MessageKind::GenerationStarted,
            Message::GenerationProgress { .. } => MessageKind::GenerationProgress,
            Message::GenerationCompleted { .. } => MessageKind::GenerationCompleted,
            Message::GenerationFailed { .. } => MessageKind::GenerationFailed,
            Message::QueueUpdated { .. } => MessageKind::QueueUpdated,
        }
    }

    /// The job this event refers to, if the server named one.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Message::GenerationStarted { id, .. }
            | Message::GenerationProgress { id, .. }
            | Message::GenerationCompleted { id, .. }
            | Message::GenerationFailed { id, .. }
            | Message::QueueUpdated { id, .. } => id.as_ref(),
        }
    }

    /// Whether the job will produce no further progress updates.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Message::GenerationCompleted { .. } | Message::GenerationFailed { .. }
        )
    }
}
