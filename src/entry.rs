//! History entries and their host-facing snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Process-unique entry identity. Never reused, even after truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Slot identity. Survives `replace`, unique among held entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(String);

impl EntryKey {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for EntryKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One slot of the session history.
///
/// Values handed out by [`Navigation`](crate::Navigation) are copies; mutating
/// them does not touch the engine.
///
/// # Example
///
/// ```
/// use history_navigator::HistoryEntry;
/// use serde_json::json;
///
/// let entry = HistoryEntry::new("https://app.local/orders", Some(json!({"page": 2})));
/// assert_eq!(entry.url(), "https://app.local/orders");
/// assert_eq!(entry.state(), Some(&json!({"page": 2})));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    id: EntryId,
    key: EntryKey,
    url: String,
    state: Option<Value>,
}

impl HistoryEntry {
    /// Create an entry with a fresh id and key.
    pub fn new(url: impl Into<String>, state: Option<Value>) -> Self {
        Self {
            id: EntryId::new(),
            key: EntryKey::new(),
            url: url.into(),
            state,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// State attached by `navigate` or `update_current_entry`.
    pub fn state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    pub(crate) fn set_key(&mut self, key: EntryKey) {
        self.key = key;
    }

    pub(crate) fn set_state(&mut self, state: Option<Value>) {
        self.state = state;
    }

    /// Snapshot handed to the host as history state.
    pub fn snapshot(&self, index: usize) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            key: self.key.clone(),
            url: self.url.clone(),
            index,
            state: self.state.clone(),
        }
    }
}

/// Serializable copy of an entry, stored in the host stack.
///
/// Host notifications carry it back, which lets the engine map a host-driven
/// move onto an existing entry (by `key`) and recognize its own echoes (by
/// `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub key: EntryKey,
    pub url: String,
    pub index: usize,
    #[serde(default)]
    pub state: Option<Value>,
}

impl EntrySnapshot {
    /// Try to read a snapshot back from raw host state.
    pub fn from_host_state(state: &Value) -> Option<Self> {
        serde_json::from_value(state.clone()).ok()
    }

    pub fn to_host_state(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_entries_have_distinct_identity() {
        let a = HistoryEntry::new("https://app.local/", None);
        let b = HistoryEntry::new("https://app.local/", None);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_snapshot_survives_host_state() {
        let entry = HistoryEntry::new("https://app.local/cart", Some(json!("step1")));
        let snapshot = entry.snapshot(3);
        let raw = snapshot.to_host_state().unwrap();

        let restored = EntrySnapshot::from_host_state(&raw).unwrap();
        assert_eq!(restored, snapshot);
        assert_eq!(restored.key, *entry.key());
        assert_eq!(restored.index, 3);
    }

    #[test]
    fn test_foreign_state_is_not_a_snapshot() {
        assert!(EntrySnapshot::from_host_state(&json!("plain")).is_none());
        assert!(EntrySnapshot::from_host_state(&json!({"key": "k"})).is_none());
    }
}
