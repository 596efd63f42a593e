//! Session table (§4.F "[ADDED] Session table"): `(session_id, scope,
//! created_at, last_seen)` records keyed in a `DashMap`, evicted by idle
//! timeout and by least-recently-seen once the process-wide cap is hit.
//! Grounded in the teacher's `dashmap`-based cache eviction idiom (the same
//! shape as `InMemoryVectorStore`'s id-keyed map, one layer up).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use memory_core::Scope;
use std::time::Duration;
use uuid::Uuid;

pub type SessionId = Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Channel back to this session's open SSE stream (§6.2: JSON-RPC
    /// responses are delivered as `event: message` frames on the stream the
    /// session was opened with, not in the `POST /messages/` response body).
    pub sse_tx: Option<tokio::sync::mpsc::UnboundedSender<String>>,
}

/// Process-wide session cap (§5: "default 1024").
pub const MAX_CONCURRENT_SESSIONS: usize = 1024;

pub struct SessionTable {
    sessions: DashMap<SessionId, Session>,
    idle_timeout: Duration,
    capacity: usize,
}

impl SessionTable {
    pub fn new(idle_timeout: Duration) -> Self {
        Self::with_capacity(idle_timeout, MAX_CONCURRENT_SESSIONS)
    }

    pub fn with_capacity(idle_timeout: Duration, capacity: usize) -> Self {
        Self { sessions: DashMap::new(), idle_timeout, capacity }
    }

    /// Open a new session for `scope`, evicting the least-recently-seen
    /// session first if the table is already at capacity (§5 LRU eviction).
    pub fn open(&self, scope: Scope) -> Session {
        if self.sessions.len() >= self.capacity {
            self.evict_least_recently_seen();
        }
        let now = Utc::now();
        let session = Session { id: Uuid::new_v4(), scope, created_at: now, last_seen: now, sse_tx: None };
        self.sessions.insert(session.id, session.clone());
        session
    }

    /// Attach the sender half of the session's SSE stream once it is
    /// constructed, so later `POST /messages/` calls can push responses
    /// onto it.
    pub fn attach_sender(&self, id: SessionId, tx: tokio::sync::mpsc::UnboundedSender<String>) {
        if let Some(mut entry) = self.sessions.get_mut(&id) {
            entry.sse_tx = Some(tx);
        }
    }

    /// Look up a session and bump its `last_seen` (§4.F: every RPC call on
    /// a session counts as activity for idle-timeout purposes).
    pub fn touch(&self, id: SessionId) -> Option<Session> {
        let mut entry = self.sessions.get_mut(&id)?;
        entry.last_seen = Utc::now();
        Some(entry.clone())
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    pub fn close(&self, id: SessionId) {
        self.sessions.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evict every session idle past `idle_timeout`. Invoked from the
    /// maintenance pass, not a hidden background timer (§4.F).
    pub fn sweep_idle(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.idle_timeout).unwrap_or_default();
        let stale: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.last_seen < cutoff)
            .map(|entry| *entry.key())
            .collect();
        for id in &stale {
            self.sessions.remove(id);
        }
        stale.len()
    }

    fn evict_least_recently_seen(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.last_seen)
            .map(|entry| *entry.key());
        if let Some(id) = oldest {
            self.sessions.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope { user_id: Some("u1".to_string()), ..Default::default() }
    }

    #[test]
    fn open_assigns_a_fresh_session_id() {
        let table = SessionTable::new(Duration::from_secs(1800));
        let a = table.open(scope());
        let b = table.open(scope());
        assert_ne!(a.id, b.id);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn sweep_idle_evicts_only_stale_sessions() {
        let table = SessionTable::new(Duration::from_secs(0));
        let session = table.open(scope());
        std::thread::sleep(Duration::from_millis(5));
        let evicted = table.sweep_idle();
        assert_eq!(evicted, 1);
        assert!(table.get(session.id).is_none());
    }

    #[test]
    fn overflow_evicts_least_recently_seen() {
        let table = SessionTable::with_capacity(Duration::from_secs(1800), 2);
        let first = table.open(scope());
        std::thread::sleep(Duration::from_millis(2));
        let _second = table.open(scope());
        std::thread::sleep(Duration::from_millis(2));
        let _third = table.open(scope());

        assert_eq!(table.len(), 2);
        assert!(table.get(first.id).is_none());
    }

    #[test]
    fn touch_updates_last_seen() {
        let table = SessionTable::new(Duration::from_secs(1800));
        let session = table.open(scope());
        let original = session.last_seen;
        std::thread::sleep(Duration::from_millis(5));
        let touched = table.touch(session.id).unwrap();
        assert!(touched.last_seen > original);
    }
}
