//! Per-session FIFO of progress events.
//!
//! Producers push without blocking; consumers pop with a timeout so a
//! stream publisher can interleave heartbeats while the worker is quiet.

use std::time::Duration;

use cr_domain::LogEvent;
use tokio::sync::{mpsc, Mutex};

/// Outcome of a bounded wait on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popped {
    Event(LogEvent),
    /// Nothing arrived within the timeout.
    Timeout,
}

/// Unbounded multi-producer FIFO. Consumers serialize on the receiver
/// lock, so each event is delivered to exactly one of them.
pub struct EventChannel {
    tx: mpsc::UnboundedSender<LogEvent>,
    rx: Mutex<mpsc::UnboundedReceiver<LogEvent>>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Append an event. Never blocks.
    pub fn push(&self, event: LogEvent) {
        // The receiver lives as long as `self`, so send cannot fail here.
        let _ = self.tx.send(event);
    }

    /// Wait up to `timeout` for the next event in insertion order.
    ///
    /// Time spent waiting for another consumer to release the receiver
    /// counts against the timeout. Cancelling the returned future never
    /// loses an event.
    pub async fn pop(&self, timeout: Duration) -> Popped {
        let wait = async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(Some(event)) => Popped::Event(event),
            Ok(None) | Err(_) => Popped::Timeout,
        }
    }

    /// Take an already-queued event without waiting.
    pub fn try_pop(&self) -> Option<LogEvent> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}
