//! Session registry: live sessions keyed by session identity.

use agentlink_types::AgentSession;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// A registered session.
#[derive(Clone)]
pub struct SessionRecord {
    pub handle: Arc<dyn AgentSession>,
    pub created_at: DateTime<Utc>,
    pub conversation_id: Option<String>,
    pub cwd: PathBuf,
}

impl SessionRecord {
    pub fn new(handle: Arc<dyn AgentSession>, conversation_id: Option<String>, cwd: PathBuf) -> Self {
        Self {
            handle,
            created_at: Utc::now(),
            conversation_id,
            cwd,
        }
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("created_at", &self.created_at)
            .field("conversation_id", &self.conversation_id)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

/// Sessions live for the lifetime of the process; nothing is persisted.
/// A session stays registered after its stream completes so it can be
/// resumed, and leaves only through [`SessionRegistry::abort`] or
/// [`SessionRegistry::remove`].
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.read(|sessions| sessions.contains_key(session_id))
    }

    /// Registered session ids, sorted.
    pub fn list_active(&self) -> Vec<String> {
        let mut ids = self.read(|sessions| sessions.keys().cloned().collect::<Vec<_>>());
        ids.sort();
        ids
    }

    /// Register a session, replacing any record under the same id.
    pub fn register(&self, session_id: impl Into<String>, record: SessionRecord) {
        let session_id = session_id.into();
        let replaced = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.clone(), record)
            .is_some();
        tracing::info!(session_id, replaced, "session registered");
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.read(|sessions| sessions.get(session_id).cloned())
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    /// Abort and close the session's backend handle, then unregister it.
    ///
    /// Failures from the handle are logged and ignored. A record registered
    /// under the same id while the handle was shutting down is left in place.
    /// Returns whether the session was registered.
    pub async fn abort(&self, session_id: &str) -> bool {
        let Some(record) = self.get(session_id) else {
            return false;
        };

        if let Err(e) = record.handle.abort().await {
            tracing::debug!(session_id, error = %e, "abort failed");
        }
        if let Err(e) = record.handle.close().await {
            tracing::debug!(session_id, error = %e, "close failed");
        }

        let replaced = !self.remove_handle(session_id, &record.handle);
        tracing::info!(session_id, replaced, "session aborted");
        true
    }

    /// Remove the record only if it still holds `handle`.
    fn remove_handle(&self, session_id: &str, handle: &Arc<dyn AgentSession>) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(session_id) {
            Some(current) if Arc::ptr_eq(&current.handle, handle) => {
                sessions.remove(session_id);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read(|sessions| sessions.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, SessionRecord>) -> T) -> T {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        f(&sessions)
    }
}
