//! One purchase attempt: identity, status, progress events and the
//! browser it owns.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cr_browser::Browser;
use cr_domain::error::{Error, Result};
use cr_domain::trace::TraceEvent;
use cr_domain::{LogEvent, SessionStatus};

use crate::channel::EventChannel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read-only snapshot returned by the inspection endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    status: AtomicU8,
    finished_at: RwLock<Option<DateTime<Utc>>>,
    channel: EventChannel,
    /// Set once a terminal event has been queued.
    terminated: AtomicBool,
    cancel: CancellationToken,
    /// Serializes `cancel` against `complete_unless_cancelled`.
    settle: Mutex<()>,
    browser: Mutex<Option<Arc<dyn Browser>>>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            status: AtomicU8::new(SessionStatus::Idle.to_u8()),
            finished_at: RwLock::new(None),
            channel: EventChannel::new(),
            terminated: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            settle: Mutex::new(()),
            browser: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        *self.finished_at.read()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Acquire)).unwrap_or(SessionStatus::Error)
    }

    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Queue a progress event.
    ///
    /// Returns `false` if the event was dropped because a terminal event
    /// has already been queued; nothing may follow the terminal record.
    pub fn emit(&self, event: LogEvent) -> bool {
        if event.is_terminal() {
            if self.terminated.swap(true, Ordering::AcqRel) {
                return false;
            }
        } else if self.terminated.load(Ordering::Acquire) {
            return false;
        }
        tracing::debug!(
            session_id = %self.id,
            level = ?event.level,
            message = %event.message,
            "session event"
        );
        self.channel.push(event);
        true
    }

    /// Move along `idle -> running -> {complete | error}`.
    ///
    /// Any other edge, including leaving a terminal status, is rejected
    /// and leaves the status untouched.
    pub fn transition(&self, next: SessionStatus) -> Result<()> {
        let current = self.status();
        if !current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: current,
                to: next,
            });
        }
        self.status
            .compare_exchange(
                current.to_u8(),
                next.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|raw| Error::InvalidTransition {
                from: SessionStatus::from_u8(raw).unwrap_or(SessionStatus::Error),
                to: next,
            })?;

        if next.is_terminal() {
            *self.finished_at.write() = Some(Utc::now());
        }
        TraceEvent::SessionStatusChanged {
            session_id: self.id.to_string(),
            from: current.as_str().into(),
            to: next.as_str().into(),
        }
        .emit();
        Ok(())
    }

    // ── cancellation ───────────────────────────────────────────────

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation. Returns `false` when the session had
    /// already finished and there was nothing to stop.
    pub fn cancel(&self) -> bool {
        let _settle = self.settle.lock();
        if self.status().is_terminal() || self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        TraceEvent::SessionCancelled {
            session_id: self.id.to_string(),
        }
        .emit();
        true
    }

    /// Settle a running session as `complete`, unless cancellation was
    /// requested first.
    ///
    /// Returns `Ok(false)` when cancellation won; the status is left as is
    /// so the caller can take the error path instead. Once this returns
    /// `Ok(true)`, `cancel` reports nothing to stop.
    pub fn complete_unless_cancelled(&self) -> Result<bool> {
        let _settle = self.settle.lock();
        if self.cancel.is_cancelled() {
            return Ok(false);
        }
        self.transition(SessionStatus::Complete)?;
        Ok(true)
    }

    // ── browser ownership ──────────────────────────────────────────

    /// Record the browser the worker launched so failure handling can
    /// find and close it.
    pub fn install_browser(&self, browser: Arc<dyn Browser>) {
        *self.browser.lock() = Some(browser);
    }

    pub fn take_browser(&self) -> Option<Arc<dyn Browser>> {
        self.browser.lock().take()
    }

    pub fn has_browser(&self) -> bool {
        self.browser.lock().is_some()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.to_string(),
            status: self.status(),
            created_at: self.created_at,
            finished_at: self.finished_at(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("has_browser", &self.has_browser())
            .finish()
    }
}
