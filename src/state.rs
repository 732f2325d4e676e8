//! Modeled session history: the entry list and the dispatcher phase.

use crate::entry::{EntryKey, HistoryEntry};
use crate::NavigationError;
use serde_json::Value;

/// Dispatcher state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPhase {
    /// No transition in flight.
    #[default]
    Idle,
    /// Host and entry list are being mutated.
    Committing,
    /// `navigate` was announced; interceptors may be pending.
    Dispatching,
    /// Completions settled, transition about to be cleared.
    Settled,
}

/// Ordered history entries plus the current position.
///
/// Never empty: it starts with the entry for the host's location at
/// registration time.
#[derive(Debug, Clone)]
pub struct EntryList {
    entries: Vec<HistoryEntry>,
    current: usize,
}

impl EntryList {
    /// Create a list holding only `initial`.
    pub fn new(initial: HistoryEntry) -> Self {
        Self {
            entries: vec![initial],
            current: 0,
        }
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn index_of(&self, key: &EntryKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key() == key)
    }

    /// Entry at `current + delta`, if any.
    pub fn relative(&self, delta: isize) -> Option<&HistoryEntry> {
        self.current
            .checked_add_signed(delta)
            .and_then(|index| self.entries.get(index))
    }

    pub fn can_go_back(&self) -> bool {
        self.current > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.current + 1 < self.entries.len()
    }

    /// Drop forward history, append `entry`, make it current.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.current + 1);
        self.entries.push(entry);
        self.current = self.entries.len() - 1;
    }

    /// Overwrite the current slot. `entry` inherits the slot's key.
    pub fn replace(&mut self, mut entry: HistoryEntry) {
        entry.set_key(self.current().key().clone());
        self.entries[self.current] = entry;
    }

    /// Make `entry` the only forward entry, keeping the current position.
    pub fn set_forward(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.current + 1);
        self.entries.push(entry);
    }

    /// Move to the entry with `key`. The position is unchanged on failure.
    pub fn traverse(&mut self, key: &EntryKey) -> Result<(), NavigationError> {
        let index = self
            .index_of(key)
            .ok_or_else(|| NavigationError::target_not_found(key.as_str()))?;
        self.current = index;
        Ok(())
    }

    /// Set the state of the current entry in place.
    pub fn update_state(&mut self, state: Option<Value>) {
        self.entries[self.current].set_state(state);
    }
}
