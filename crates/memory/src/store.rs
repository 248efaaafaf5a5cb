use crate::types::SessionContext;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// One session's shared state. The async mutex is the single-writer guard:
/// message handling acquires it for the duration of a command cycle, so a
/// second message for the same session can detect the in-flight command with
/// `try_lock` instead of racing it. `interrupt` carries a user-initiated
/// stop to the observer's read loop.
pub struct SessionHandle {
    pub context: Mutex<SessionContext>,
    pub interrupt: Notify,
}

impl SessionHandle {
    fn new() -> Self {
        Self {
            context: Mutex::new(SessionContext::default()),
            interrupt: Notify::new(),
        }
    }
}

/// Process-wide map from session identifier to context. Entries are created
/// lazily and never evicted; clearing conversational history is a separate
/// store's concern and does not touch these entries.
pub struct SessionContextStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionContextStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, session_id: &str) -> Arc<SessionHandle> {
        if let Some(handle) = self.sessions.read().get(session_id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write();
        // Another writer may have created the entry between the locks.
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(SessionHandle::new())),
        )
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for SessionContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_creation_returns_default_context() {
        let store = SessionContextStore::new();
        let handle = store.get("chat:42");
        let ctx = handle.context.lock().await;
        assert!(ctx.last_command_run.is_none());
        assert!(!ctx.awaiting_debug_response);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_session_shares_state() {
        let store = SessionContextStore::new();
        {
            let handle = store.get("chat:42");
            handle.context.lock().await.begin_command("ls");
        }
        let handle = store.get("chat:42");
        let ctx = handle.context.lock().await;
        assert_eq!(ctx.last_command_run.as_deref(), Some("ls"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionContextStore::new();
        store.get("chat:1").context.lock().await.begin_command("ls");

        let other = store.get("chat:2");
        assert!(other.context.lock().await.last_command_run.is_none());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_try_lock_detects_in_flight_work() {
        let store = SessionContextStore::new();
        let handle = store.get("chat:42");
        let guard = handle.context.lock().await;

        let busy = store.get("chat:42");
        assert!(busy.context.try_lock().is_err());
        drop(guard);
        assert!(handle.context.try_lock().is_ok());
    }
}
