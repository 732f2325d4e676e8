//! Transition requests and their public view.
//!
//! A [`TransitionRequest`] is created for every navigation call and for every
//! host-driven move the engine did not initiate. The dispatcher owns it until
//! its `finished` signal settles; callers only get the
//! [`NavigationResult`](crate::NavigationResult) pair, and observers get the
//! read-only [`Transition`] while it is in flight.

use crate::entry::{EntryKey, HistoryEntry};
use crate::signal::{AbortSignal, Completion, NavigationResult, Signal};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSITION_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of move a transition performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationType {
    Push,
    Replace,
    Reload,
    Traverse,
}

impl NavigationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Replace => "replace",
            Self::Reload => "reload",
            Self::Traverse => "traverse",
        }
    }
}

impl fmt::Display for NavigationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `history` option of [`Navigation::navigate`](crate::Navigation::navigate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryBehavior {
    /// Same as `Push`.
    #[default]
    Auto,
    Push,
    Replace,
}

/// Options for [`Navigation::navigate`](crate::Navigation::navigate).
///
/// # Example
///
/// ```
/// use history_navigator::{HistoryBehavior, NavigateOptions};
/// use serde_json::json;
///
/// let options = NavigateOptions::new()
///     .state(json!({"tab": "details"}))
///     .info("from-sidebar")
///     .history(HistoryBehavior::Replace);
/// assert!(options.is_replace());
/// ```
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    pub state: Option<Value>,
    pub info: Option<Value>,
    pub history: HistoryBehavior,
    /// Legacy flag, equivalent to `history: Replace`.
    pub replace: bool,
}

impl NavigateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: impl Into<Value>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn info(mut self, info: impl Into<Value>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn history(mut self, history: HistoryBehavior) -> Self {
        self.history = history;
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn is_replace(&self) -> bool {
        self.replace || self.history == HistoryBehavior::Replace
    }

    pub(crate) fn navigation_type(&self) -> NavigationType {
        if self.is_replace() {
            NavigationType::Replace
        } else {
            NavigationType::Push
        }
    }
}

/// Where a traversal goes.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    /// Push, replace and reload need no lookup.
    Current,
    /// Engine-initiated traversal to an entry held in the list.
    Key(EntryKey),
    /// Host already moved; land on the known entry or append the fresh one.
    Host { key: Option<EntryKey> },
}

/// One requested move.
pub(crate) struct TransitionRequest {
    pub id: u64,
    pub navigation_type: NavigationType,
    /// Absolute destination URL.
    pub destination: String,
    pub info: Option<Value>,
    /// New entry for push/replace; fresh entry for an unknown host move.
    pub entry: HistoryEntry,
    pub target: Target,
    /// Entry current when the request became active.
    pub from: Option<HistoryEntry>,
    pub signal: AbortSignal,
    pub committed: Signal,
    pub finished: Signal,
}

impl TransitionRequest {
    pub(crate) fn new(
        navigation_type: NavigationType,
        destination: String,
        entry: HistoryEntry,
        target: Target,
        info: Option<Value>,
    ) -> Self {
        Self {
            id: NEXT_TRANSITION_ID.fetch_add(1, Ordering::Relaxed),
            navigation_type,
            destination,
            info,
            entry,
            target,
            from: None,
            signal: AbortSignal::new(),
            committed: Signal::new(),
            finished: Signal::new(),
        }
    }

    /// The pair handed back to the caller.
    pub(crate) fn result(&self) -> NavigationResult {
        NavigationResult::new(&self.committed, &self.finished)
    }

    pub(crate) fn is_host_driven(&self) -> bool {
        matches!(self.target, Target::Host { .. })
    }

    pub(crate) fn view(&self) -> Transition {
        Transition {
            navigation_type: self.navigation_type,
            from: self.from.clone(),
            finished: self.finished.subscribe(),
        }
    }
}

impl fmt::Debug for TransitionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRequest")
            .field("id", &self.id)
            .field("navigation_type", &self.navigation_type)
            .field("destination", &self.destination)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Read-only view of the transition in flight.
#[derive(Debug, Clone)]
pub struct Transition {
    navigation_type: NavigationType,
    from: Option<HistoryEntry>,
    finished: Completion,
}

impl Transition {
    pub fn navigation_type(&self) -> NavigationType {
        self.navigation_type
    }

    /// Entry that was current when the transition started.
    pub fn from(&self) -> Option<&HistoryEntry> {
        self.from.as_ref()
    }

    pub fn finished(&self) -> Completion {
        self.finished.clone()
    }
}
