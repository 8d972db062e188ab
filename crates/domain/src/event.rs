//! Progress events and session status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message carried by the last event of a successful run.
pub const COMPLETION_SENTINEL: &str = "COMPLETE";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Level
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[default]
    Info,
    Success,
    Error,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Log event
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One timestamped progress record produced by a purchase worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Local wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    pub message: String,
    pub level: Level,
}

impl LogEvent {
    /// Stamp a new event with the current local time.
    pub fn new(message: impl Into<String>, level: Level) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
            level,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Level::Info)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Level::Error)
    }

    /// The terminal success record.
    pub fn complete() -> Self {
        Self::new(COMPLETION_SENTINEL, Level::Success)
    }

    /// An error-level event or the completion sentinel ends the stream.
    pub fn is_terminal(&self) -> bool {
        self.level == Level::Error || self.message == COMPLETION_SENTINEL
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Complete,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether `self -> next` is an edge of `idle -> running -> {complete|error}`.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Complete)
                | (Self::Running, Self::Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Compact encoding for lock-free storage.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Complete => 2,
            Self::Error => 3,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Idle),
            1 => Some(Self::Running),
            2 => Some(Self::Complete),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events() {
        assert!(LogEvent::error("boom").is_terminal());
        assert!(LogEvent::complete().is_terminal());
        assert!(!LogEvent::info("working").is_terminal());
        // The sentinel is terminal regardless of level.
        assert!(LogEvent::new(COMPLETION_SENTINEL, Level::Info).is_terminal());
        assert!(!LogEvent::new("COMPLETE!", Level::Success).is_terminal());
    }

    #[test]
    fn timestamp_has_second_granularity() {
        let event = LogEvent::info("x");
        assert_eq!(event.timestamp.len(), 8);
        assert_eq!(event.timestamp.matches(':').count(), 2);
    }

    #[test]
    fn event_serializes_with_lowercase_level() {
        let event = LogEvent {
            timestamp: "12:00:01".into(),
            message: "hello".into(),
            level: Level::Success,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "timestamp": "12:00:01", "message": "hello", "level": "success" })
        );
    }

    #[test]
    fn status_transitions_follow_the_lifecycle() {
        use SessionStatus::*;
        assert!(Idle.can_transition_to(Running));
        assert!(Running.can_transition_to(Complete));
        assert!(Running.can_transition_to(Error));

        assert!(!Idle.can_transition_to(Complete));
        assert!(!Idle.can_transition_to(Error));
        assert!(!Running.can_transition_to(Idle));
        for terminal in [Complete, Error] {
            for next in [Idle, Running, Complete, Error] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn status_u8_encoding_is_lossless() {
        for status in [
            SessionStatus::Idle,
            SessionStatus::Running,
            SessionStatus::Complete,
            SessionStatus::Error,
        ] {
            assert_eq!(SessionStatus::from_u8(status.to_u8()), Some(status));
        }
        assert_eq!(SessionStatus::from_u8(9), None);
    }
}
