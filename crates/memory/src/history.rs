use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub role: String,
    pub content: String,
}

/// Per-session conversation log, separate from the execution context so an
/// explicit clear request can drop the chat transcript without disturbing a
/// pending command or recovery cycle.
pub struct ChatHistoryStore {
    histories: RwLock<HashMap<String, Vec<HistoryEntry>>>,
}

impl ChatHistoryStore {
    pub fn new() -> Self {
        Self {
            histories: RwLock::new(HashMap::new()),
        }
    }

    pub fn append(&self, session_id: &str, role: &str, content: &str) {
        let mut histories = self.histories.write();
        histories
            .entry(session_id.to_string())
            .or_default()
            .push(HistoryEntry {
                timestamp: chrono::Utc::now().timestamp(),
                role: role.to_string(),
                content: content.to_string(),
            });
    }

    /// Last `n` entries in conversation order.
    pub fn recent(&self, session_id: &str, n: usize) -> Vec<HistoryEntry> {
        let histories = self.histories.read();
        match histories.get(session_id) {
            Some(entries) => {
                let start = entries.len().saturating_sub(n);
                entries[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Removes the transcript for a session. Returns false if there was
    /// nothing to remove.
    pub fn clear(&self, session_id: &str) -> bool {
        let removed = self.histories.write().remove(session_id).is_some();
        if removed {
            tracing::info!(session_id, "chat history cleared");
        }
        removed
    }
}

impl Default for ChatHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
