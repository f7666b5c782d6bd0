//! Audit trail of admin edits.
//!
//! Every create, change and delete performed through the admin records a
//! [`LogEntry`]. Users see their own recent entries on the `/log/` page.
//!
//! # Examples
//!
//! ```
//! use smallspider_admin::log_entry::{ActionFlag, InMemoryLogEntryStore, LogEntryStore};
//!
//! let store = InMemoryLogEntryStore::new();
//! store.record(1, ActionFlag::Addition, "blog.post", "42", "Hello", "Added.");
//! store.record(1, ActionFlag::Deletion, "blog.post", "42", "Hello", "");
//!
//! let recent = store.recent_for_user(1, 10);
//! assert_eq!(recent[0].action_flag, ActionFlag::Deletion);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::recover;

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionFlag {
    /// The object was created.
    Addition,
    /// The object was modified.
    Change,
    /// The object was deleted.
    Deletion,
}

impl ActionFlag {
    /// A human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Addition => "Addition",
            Self::Change => "Change",
            Self::Deletion => "Deletion",
        }
    }
}

impl fmt::Display for ActionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One recorded admin edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Sequential identifier.
    pub id: u64,
    /// When the edit happened.
    pub action_time: DateTime<Utc>,
    /// Who made it.
    pub user_id: u64,
    /// The model key of the object (e.g., "blog.post").
    pub content_type: String,
    /// The object's primary key.
    pub object_id: String,
    /// The object's string representation at the time.
    pub object_repr: String,
    /// The kind of edit.
    pub action_flag: ActionFlag,
    /// Free-form description, e.g. the changed field names.
    pub change_message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} (pk={}) by user {}",
            self.action_time.format("%Y-%m-%d %H:%M:%S"),
            self.action_flag,
            self.object_repr,
            self.object_id,
            self.user_id,
        )
    }
}

/// Storage for the audit trail.
pub trait LogEntryStore: Send + Sync {
    /// Records an edit and returns the stored entry.
    fn record(
        &self,
        user_id: u64,
        action_flag: ActionFlag,
        content_type: &str,
        object_id: &str,
        object_repr: &str,
        change_message: &str,
    ) -> LogEntry;

    /// The user's most recent entries, newest first.
    fn recent_for_user(&self, user_id: u64, limit: usize) -> Vec<LogEntry>;

    /// Every entry about one object, newest first.
    fn for_object(&self, content_type: &str, object_id: &str) -> Vec<LogEntry>;
}

/// In-memory [`LogEntryStore`]. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogEntryStore {
    entries: Arc<RwLock<Vec<LogEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryLogEntryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of recorded entries.
    pub fn len(&self) -> usize {
        recover(self.entries.read()).len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogEntryStore for InMemoryLogEntryStore {
    fn record(
        &self,
        user_id: u64,
        action_flag: ActionFlag,
        content_type: &str,
        object_id: &str,
        object_repr: &str,
        change_message: &str,
    ) -> LogEntry {
        let entry = LogEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            action_time: Utc::now(),
            user_id,
            content_type: content_type.to_string(),
            object_id: object_id.to_string(),
            object_repr: object_repr.to_string(),
            action_flag,
            change_message: change_message.to_string(),
        };
        tracing::info!(
            user_id,
            action = %action_flag,
            content_type,
            object_id,
            "admin log entry"
        );
        recover(self.entries.write()).push(entry.clone());
        entry
    }

    fn recent_for_user(&self, user_id: u64, limit: usize) -> Vec<LogEntry> {
        recover(self.entries.read())
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn for_object(&self, content_type: &str, object_id: &str) -> Vec<LogEntry> {
        recover(self.entries.read())
            .iter()
            .rev()
            .filter(|e| e.content_type == content_type && e.object_id == object_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_assigns_ids() {
        let store = InMemoryLogEntryStore::new();
        let a = store.record(1, ActionFlag::Addition, "blog.tag", "1", "rust", "");
        let b = store.record(1, ActionFlag::Change, "blog.tag", "1", "rust", "Changed name.");
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_recent_for_user_filters_and_limits() {
        let store = InMemoryLogEntryStore::new();
        for i in 0..5 {
            store.record(1, ActionFlag::Addition, "blog.tag", &i.to_string(), "t", "");
        }
        store.record(2, ActionFlag::Addition, "blog.tag", "9", "other", "");

        let recent = store.recent_for_user(1, 3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].object_id, "4");
        assert!(recent.iter().all(|e| e.user_id == 1));
        assert!(store.recent_for_user(3, 10).is_empty());
    }

    #[test]
    fn test_for_object() {
        let store = InMemoryLogEntryStore::new();
        store.record(1, ActionFlag::Addition, "blog.post", "1", "a", "");
        store.record(1, ActionFlag::Addition, "blog.tag", "1", "b", "");
        store.record(1, ActionFlag::Deletion, "blog.post", "1", "a", "");
        let history = store.for_object("blog.post", "1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action_flag, ActionFlag::Deletion);
    }

    #[test]
    fn test_display() {
        let store = InMemoryLogEntryStore::new();
        let entry = store.record(3, ActionFlag::Change, "blog.post", "7", "Hello", "");
        let text = entry.to_string();
        assert!(text.contains("Change Hello (pk=7) by user 3"));
        assert_eq!(
            serde_json::to_value(ActionFlag::Deletion).unwrap(),
            serde_json::json!("deletion")
        );
    }
}
