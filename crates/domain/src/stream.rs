use serde::Serialize;

use crate::event::LogEvent;

/// A single record on a session's live log stream.
///
/// Serialized untagged so the wire shape is one of:
/// `{timestamp, message, level}`, `{"ping": true}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StreamRecord {
    Event(LogEvent),
    Heartbeat { ping: bool },
    Error { error: String },
}

impl StreamRecord {
    pub fn heartbeat() -> Self {
        Self::Heartbeat { ping: true }
    }

    pub fn session_not_found() -> Self {
        Self::Error {
            error: "Session not found".into(),
        }
    }

    /// Whether the stream ends after this record.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Event(event) => event.is_terminal(),
            Self::Heartbeat { .. } => false,
            Self::Error { .. } => true,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<LogEvent> for StreamRecord {
    fn from(event: LogEvent) -> Self {
        Self::Event(event)
    }
}
