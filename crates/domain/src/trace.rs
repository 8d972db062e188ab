use serde::Serialize;

/// Structured trace events emitted across all cartrunner crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
    },
    SessionStatusChanged {
        session_id: String,
        from: String,
        to: String,
    },
    SessionCancelled {
        session_id: String,
    },
    SessionsReaped {
        removed: usize,
        remaining: usize,
    },
    StageStarted {
        session_id: String,
        stage: String,
    },
    BrowserLaunched {
        session_id: String,
        headless: bool,
        duration_ms: u64,
    },
    BrowserReleased {
        session_id: String,
        reason: String,
    },
    StreamAttached {
        session_id: String,
    },
    StreamClosed {
        session_id: String,
        records: usize,
        heartbeats: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cr_event");
    }
}
