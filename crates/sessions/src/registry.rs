//! Process-wide table of live sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use cr_domain::trace::TraceEvent;

use crate::session::Session;

/// Concurrent `id -> session` map. The underlying table is never
/// handed out; callers only see `Arc<Session>` clones.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh idle session and register it.
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions.write().insert(session.id(), session.clone());
        TraceEvent::SessionCreated {
            session_id: session.id().to_string(),
        }
        .emit();
        session
    }

    pub fn lookup(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Look up by the textual id a client sent; malformed ids are simply
    /// unknown.
    pub fn lookup_str(&self, id: &str) -> Option<Arc<Session>> {
        let id = Uuid::parse_str(id).ok()?;
        self.lookup(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// All sessions, oldest first.
    pub fn list(&self) -> Vec<Arc<Session>> {
        let mut all: Vec<_> = self.sessions.read().values().cloned().collect();
        all.sort_by_key(|s| s.created_at());
        all
    }

    /// Evict sessions that have been terminal for at least `retention`.
    ///
    /// Idle and running sessions are never touched.  A zero retention
    /// disables eviction.  Returns the number removed.
    pub fn reap_terminal(&self, retention: Duration, now: DateTime<Utc>) -> usize {
        if retention.is_zero() {
            return 0;
        }
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };

        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| match session.finished_at() {
            Some(finished) if session.status().is_terminal() => now - finished < retention,
            _ => true,
        });
        let removed = before - sessions.len();
        let remaining = sessions.len();
        drop(sessions);

        if removed > 0 {
            TraceEvent::SessionsReaped { removed, remaining }.emit();
        }
        removed
    }

    /// Cancel every session that is still in flight. Returns how many
    /// were signalled.
    pub fn cancel_all(&self) -> usize {
        self.list().iter().filter(|s| s.cancel()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_domain::SessionStatus;
    use std::collections::HashSet;

    #[test]
    fn create_registers_idle_session_with_unique_id() {
        let registry = SessionRegistry::new();
        let ids: HashSet<_> = (0..50).map(|_| registry.create().id()).collect();
        assert_eq!(ids.len(), 50);
        assert_eq!(registry.len(), 50);

        let id = *ids.iter().next().unwrap();
        let session = registry.lookup(&id).unwrap();
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn unknown_and_malformed_ids_are_not_found() {
        let registry = SessionRegistry::new();
        registry.create();
        assert!(registry.lookup(&Uuid::new_v4()).is_none());
        assert!(registry.lookup_str("not-a-uuid").is_none());
        assert!(registry.lookup_str("").is_none());
        assert_eq!(registry.len(), 1, "lookups never create entries");
    }

    #[test]
    fn lookup_str_finds_existing_session() {
        let registry = SessionRegistry::new();
        let session = registry.create();
        let found = registry.lookup_str(&session.id().to_string()).unwrap();
        assert!(Arc::ptr_eq(&session, &found));
    }

    #[test]
    fn reap_only_evicts_expired_terminal_sessions() {
        let registry = SessionRegistry::new();
        let idle = registry.create();
        let running = registry.create();
        running.transition(SessionStatus::Running).unwrap();
        let done = registry.create();
        done.transition(SessionStatus::Running).unwrap();
        done.transition(SessionStatus::Complete).unwrap();

        let retention = Duration::from_secs(60);
        assert_eq!(registry.reap_terminal(retention, Utc::now()), 0);

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(registry.reap_terminal(retention, later), 1);
        assert!(registry.lookup(&done.id()).is_none());
        assert!(registry.lookup(&idle.id()).is_some());
        assert!(registry.lookup(&running.id()).is_some());
    }

    #[test]
    fn zero_retention_keeps_everything() {
        let registry = SessionRegistry::new();
        let done = registry.create();
        done.transition(SessionStatus::Running).unwrap();
        done.transition(SessionStatus::Error).unwrap();
        let far = Utc::now() + chrono::Duration::days(30);
        assert_eq!(registry.reap_terminal(Duration::ZERO, far), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cancel_all_skips_finished_sessions() {
        let registry = SessionRegistry::new();
        let a = registry.create();
        a.transition(SessionStatus::Running).unwrap();
        let b = registry.create();
        b.transition(SessionStatus::Running).unwrap();
        b.transition(SessionStatus::Complete).unwrap();

        assert_eq!(registry.cancel_all(), 1);
        assert!(a.cancellation().is_cancelled());
        assert!(!b.cancellation().is_cancelled());
    }

    #[test]
    fn concurrent_create_and_lookup() {
        let registry = Arc::new(SessionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let s = registry.create();
                        assert!(registry.lookup(&s.id()).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 800);
    }
}
