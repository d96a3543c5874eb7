use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::types::{generate_session_id, Session};

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-memory admin-login session store. Intentionally not SQLite-backed —
/// a session is a login cookie, not durable state, and keeping it out of
/// the database means it never blocks on the storage writer lock.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn create(&self) -> Session {
        let now = Utc::now();
        let session = Session {
            id: generate_session_id(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(24)),
        };
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Result<Session> {
        let entry = self.sessions.get(id).ok_or(SessionError::NotFound)?;
        if entry.is_expired(Utc::now()) {
            drop(entry);
            self.sessions.remove(id);
            return Err(SessionError::Expired);
        }
        Ok(entry.clone())
    }

    pub fn delete(&self, id: &str) {
        self.sessions.remove(id);
    }

    fn sweep(&self) {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(removed, "swept expired admin sessions");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the background eviction loop. Returns the task handle so the
/// caller can abort it on shutdown; the store itself has no lifetime tied
/// to the task.
pub fn spawn_sweeper(store: Arc<SessionStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            store.sweep();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_round_trips() {
        let store = SessionStore::new();
        let session = store.create();
        let fetched = store.get(&session.id).unwrap();
        assert_eq!(fetched.id, session.id);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = SessionStore::new();
        assert!(matches!(store.get("nope"), Err(SessionError::NotFound)));
    }

    #[test]
    fn expired_session_is_rejected_and_evicted() {
        let store = SessionStore::with_ttl(Duration::from_millis(1));
        let session = store.create();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(store.get(&session.id), Err(SessionError::Expired)));
        assert!(store.sessions.is_empty());
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let store = SessionStore::with_ttl(Duration::from_millis(1));
        let fresh_store = SessionStore::new();
        let _short_lived = store.create();
        let long_lived = fresh_store.create();
        std::thread::sleep(Duration::from_millis(5));

        store.sweep();
        assert!(store.sessions.is_empty());

        fresh_store.sweep();
        assert!(fresh_store.get(&long_lived.id).is_ok());
    }

    #[tokio::test]
    async fn sweeper_task_runs_without_panicking() {
        let store = Arc::new(SessionStore::new());
        let handle = spawn_sweeper(store.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
    }
}
