//! Identity-keyed registry of running sessions.
//!
//! At most one session exists per identity. The map is guarded by a single
//! async mutex; check-then-insert ([`insert_with`](SessionRegistry::insert_with))
//! and check-then-rebuild ([`with_instance`](SessionRegistry::with_instance))
//! both happen under that lock, so a stop can never interleave with a
//! reconnect or a duplicate start.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::orchestrator::session::Session;
use crate::Result;

/// Result of [`SessionRegistry::insert_with`].
pub enum InsertOutcome<T> {
    /// The builder ran and its session was registered.
    Inserted(Arc<Session>, T),
    /// A session for the identity already exists; the builder did not run.
    AlreadyPresent,
}

/// Running sessions keyed by identity.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the session produced by `build` unless `identity` is
    /// already present. The presence check, build and insert are atomic.
    ///
    /// # Errors
    ///
    /// Propagates the builder's error; nothing is registered in that case.
    pub async fn insert_with<T, F>(&self, identity: &str, build: F) -> Result<InsertOutcome<T>>
    where
        F: FnOnce() -> Result<(Arc<Session>, T)>,
    {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(identity) {
            warn!(identity, "already running; skipped");
            return Ok(InsertOutcome::AlreadyPresent);
        }
        let (session, extra) = build()?;
        sessions.insert(identity.to_owned(), Arc::clone(&session));
        Ok(InsertOutcome::Inserted(session, extra))
    }

    /// Stop and deregister `identity`. Returns whether it was present;
    /// removing an absent identity is a no-op.
    pub async fn remove(&self, identity: &str, reason: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(identity) {
            Some(session) => {
                session.end(reason);
                sessions.remove(identity);
                info!(identity, reason, "session removed");
                true
            }
            None => false,
        }
    }

    /// Stop and deregister every session. Returns the removed identities.
    pub async fn remove_all(&self, reason: &str) -> Vec<String> {
        let mut sessions = self.sessions.lock().await;
        let mut removed: Vec<String> = sessions
            .drain()
            .map(|(identity, session)| {
                session.end(reason);
                identity
            })
            .collect();
        removed.sort();
        info!(count = removed.len(), reason, "all sessions removed");
        removed
    }

    /// Deregister `identity` only if it is still the given instance.
    /// Used by a session that gives up on its own; the handle is already
    /// down so nothing is terminated.
    pub async fn remove_instance(&self, identity: &str, instance: Uuid) -> bool {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .get(identity)
            .is_some_and(|s| s.instance_id() == instance)
        {
            sessions.remove(identity);
            true
        } else {
            false
        }
    }

    /// Session registered for `identity`.
    pub async fn get(&self, identity: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(identity).cloned()
    }

    /// Run `f` on the session while holding the registry lock, but only if
    /// `identity` is still registered as `instance`.
    pub async fn with_instance<T>(
        &self,
        identity: &str,
        instance: Uuid,
        f: impl FnOnce(&Arc<Session>) -> T,
    ) -> Option<T> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(identity)
            .filter(|s| s.instance_id() == instance)
            .map(f)
    }

    /// All registered sessions, ordered by identity.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        let mut all: Vec<Arc<Session>> = self.sessions.lock().await.values().cloned().collect();
        all.sort_by(|a, b| a.identity().cmp(b.identity()));
        all
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
