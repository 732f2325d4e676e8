//! The navigation service.
//!
//! [`Navigation`] is the object application code holds. It owns the modeled
//! [`EntryList`], the [`EventBus`] and the installed [`HostBridge`], and feeds
//! every request into the dispatcher task spawned by [`Navigation::register`].
//!
//! Calls never block and never fail synchronously: each returns a
//! [`NavigationResult`] whose `committed` and `finished` completions settle as
//! the dispatcher works through the request. Requests that can be rejected
//! without looking at the host (unknown key, nothing to go back to, bad URL)
//! come back already settled.
//!
//! # Example
//!
//! ```no_run
//! use history_navigator::{MemoryHistory, NavigateOptions, Navigation, NavigationOptions};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), history_navigator::NavigationError> {
//! let host = Arc::new(MemoryHistory::new("https://app.local/"));
//! let nav = Navigation::register(host, NavigationOptions::default());
//!
//! nav.navigate("./orders", NavigateOptions::new()).finished.await?;
//! assert_eq!(nav.current_entry().url(), "https://app.local/orders");
//!
//! nav.back().finished.await?;
//! nav.unregister();
//! # Ok(())
//! # }
//! ```

use crate::bridge::{History, HostBridge};
use crate::dispatcher::{Command, Dispatcher};
use crate::entry::{EntryKey, HistoryEntry};
use crate::error::HandlerError;
use crate::events::{
    CurrentEntryChangeEvent, EventBus, ListenerId, NavigateErrorEvent, NavigateEvent,
    NavigateSuccessEvent,
};
use crate::host::HistoryHost;
use crate::location;
use crate::signal::NavigationResult;
use crate::state::{DispatchPhase, EntryList};
use crate::transition::{NavigateOptions, NavigationType, Target, Transition, TransitionRequest};
use crate::{debug_log, info_log, warn_log, NavigationError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

// ============================================================================
// NavigationOptions
// ============================================================================

/// Registration options.
///
/// ```
/// use history_navigator::NavigationOptions;
/// use std::time::Duration;
///
/// let options = NavigationOptions::new()
///     .raise_history_pop_state(true)
///     .commit_delay(Duration::ZERO);
/// assert!(options.raise_history_pop_state);
/// ```
#[derive(Debug, Clone)]
pub struct NavigationOptions {
    /// Compatibility mode: after each engine push/replace, dispatch a host
    /// notification so legacy code listening to the host keeps working.
    pub raise_history_pop_state: bool,
    /// Pause before a push or replace is committed.
    pub commit_delay: Duration,
    /// Pause before the compatibility notification is dispatched.
    pub echo_delay: Duration,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            raise_history_pop_state: false,
            commit_delay: Duration::from_millis(35),
            echo_delay: Duration::from_millis(25),
        }
    }
}

impl NavigationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise_history_pop_state(mut self, raise: bool) -> Self {
        self.raise_history_pop_state = raise;
        self
    }

    pub fn commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    pub fn echo_delay(mut self, delay: Duration) -> Self {
        self.echo_delay = delay;
        self
    }
}

// ============================================================================
// Shared state
// ============================================================================

/// State read by accessors and written by the dispatcher.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) entries: EntryList,
    pub(crate) phase: DispatchPhase,
    /// Active transition, tagged with its request id.
    pub(crate) transition: Option<(u64, Transition)>,
}

pub(crate) struct Inner {
    pub(crate) shared: Mutex<Shared>,
    pub(crate) bus: EventBus,
    pub(crate) bridge: HostBridge,
    pub(crate) mailbox: Mutex<Option<UnboundedSender<Command>>>,
    /// Transition requests sent but not yet taken by the dispatcher.
    pub(crate) queued: AtomicUsize,
    pub(crate) options: NavigationOptions,
}

// ============================================================================
// Navigation
// ============================================================================

/// Handle to a registered navigation engine. Cheap to clone.
#[derive(Clone)]
pub struct Navigation {
    inner: Arc<Inner>,
}

impl Navigation {
    /// Install the engine on `host`.
    ///
    /// The current host location becomes the initial entry. Must be called
    /// from within a Tokio runtime; the dispatcher runs as a spawned task
    /// until [`unregister`](Self::unregister).
    pub fn register(host: Arc<dyn HistoryHost>, options: NavigationOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = HistoryEntry::new(host.location(), None);
        let bridge = HostBridge::install(host, &options, tx.clone());
        if let Err(err) = bridge.seed(&initial.snapshot(0)) {
            warn_log!("initial entry not stored in host: {}", err);
        }
        info_log!("navigation registered at '{}'", initial.url());

        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared {
                entries: EntryList::new(initial),
                phase: DispatchPhase::Idle,
                transition: None,
            }),
            bus: EventBus::new(),
            bridge,
            mailbox: Mutex::new(Some(tx)),
            queued: AtomicUsize::new(0),
            options,
        });
        tokio::spawn(Dispatcher::new(Arc::clone(&inner)).run(rx));

        Self { inner }
    }

    /// Detach from the host and stop the dispatcher.
    ///
    /// A transition still in flight is rejected. The [`History`] facade falls
    /// back to the raw host afterwards.
    pub fn unregister(&self) {
        self.inner.bridge.restore();
        if self.inner.mailbox.lock().take().is_some() {
            info_log!("navigation unregistered");
        }
    }

    pub fn is_registered(&self) -> bool {
        self.inner.mailbox.lock().is_some()
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Navigate to `destination`, resolved against the current entry.
    pub fn navigate(&self, destination: &str, options: NavigateOptions) -> NavigationResult {
        let base = self.current_entry().url().to_string();
        let url = match location::resolve(&base, destination) {
            Ok(url) => url,
            Err(err) => {
                debug_log!("navigate rejected: {}", err);
                return NavigationResult::rejected(err);
            }
        };

        let navigation_type = options.navigation_type();
        let entry = HistoryEntry::new(url.clone(), options.state);
        self.submit(TransitionRequest::new(
            navigation_type,
            url,
            entry,
            Target::Current,
            options.info,
        ))
    }

    pub fn back(&self) -> NavigationResult {
        match self.entry_at(-1) {
            Some(entry) => self.traverse(entry, None),
            None => NavigationResult::rejected(NavigationError::InitialState {
                message: "cannot go back from the first entry".to_string(),
            }),
        }
    }

    pub fn forward(&self, info: Option<Value>) -> NavigationResult {
        match self.entry_at(1) {
            Some(entry) => self.traverse(entry, info),
            None => NavigationResult::rejected(NavigationError::target_not_found("forward")),
        }
    }

    /// Move to the entry with `key`.
    pub fn traverse_to(&self, key: &EntryKey, info: Option<Value>) -> NavigationResult {
        let entry = {
            let shared = self.inner.shared.lock();
            shared
                .entries
                .index_of(key)
                .and_then(|index| shared.entries.get(index))
                .cloned()
        };
        match entry {
            Some(entry) => self.traverse(entry, info),
            None => NavigationResult::rejected(NavigationError::target_not_found(key.as_str())),
        }
    }

    /// Re-run the navigation lifecycle for the current entry, then reload the
    /// host.
    pub fn reload(&self, info: Option<Value>) -> NavigationResult {
        let current = self.current_entry();
        self.submit(TransitionRequest::new(
            NavigationType::Reload,
            current.url().to_string(),
            current,
            Target::Current,
            info,
        ))
    }

    /// Set the state of the current entry and announce `currententrychange`.
    ///
    /// The update is applied by the dispatcher in mailbox order, so it lands
    /// on whichever entry is current once earlier requests have committed.
    pub fn update_current_entry(&self, state: impl Into<Value>) {
        let command = Command::UpdateCurrentEntry(state.into());
        let unsent = match self.inner.mailbox.lock().as_ref() {
            Some(mailbox) => mailbox.send(command).err().map(|e| e.0),
            None => Some(command),
        };

        // Without a dispatcher the handle is the only writer left.
        if let Some(Command::UpdateCurrentEntry(state)) = unsent {
            let from = {
                let mut shared = self.inner.shared.lock();
                let from = shared.entries.current().clone();
                shared.entries.update_state(Some(state));
                from
            };
            self.inner.bus.dispatch_entry_change(&CurrentEntryChangeEvent {
                navigation_type: NavigationType::Replace,
                from,
            });
        }
    }

    fn traverse(&self, target: HistoryEntry, info: Option<Value>) -> NavigationResult {
        let key = target.key().clone();
        self.submit(TransitionRequest::new(
            NavigationType::Traverse,
            target.url().to_string(),
            target,
            Target::Key(key),
            info,
        ))
    }

    fn submit(&self, request: TransitionRequest) -> NavigationResult {
        let result = request.result();
        // Counted before sending so the dispatcher never sees it uncounted.
        self.inner.queued.fetch_add(1, Ordering::SeqCst);
        let unsent = match self.inner.mailbox.lock().as_ref() {
            Some(mailbox) => mailbox.send(Command::Transition(request)).err().map(|e| e.0),
            None => Some(Command::Transition(request)),
        };

        if let Some(Command::Transition(request)) = unsent {
            self.inner.queued.fetch_sub(1, Ordering::SeqCst);
            let err = NavigationError::aborted("navigation unregistered");
            request.committed.reject(err.clone());
            request.finished.reject(err);
        }
        result
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.inner.shared.lock().entries.entries().to_vec()
    }

    pub fn current_entry(&self) -> HistoryEntry {
        self.inner.shared.lock().entries.current().clone()
    }

    pub fn current_index(&self) -> usize {
        self.inner.shared.lock().entries.current_index()
    }

    pub fn can_go_back(&self) -> bool {
        self.inner.shared.lock().entries.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.inner.shared.lock().entries.can_go_forward()
    }

    /// The transition in flight, if any.
    pub fn transition(&self) -> Option<Transition> {
        self.inner
            .shared
            .lock()
            .transition
            .as_ref()
            .map(|(_, transition)| transition.clone())
    }

    pub fn phase(&self) -> DispatchPhase {
        self.inner.shared.lock().phase
    }

    /// Entry `delta` positions away from the current one.
    pub fn entry_at(&self, delta: isize) -> Option<HistoryEntry> {
        self.inner.shared.lock().entries.relative(delta).cloned()
    }

    pub fn options(&self) -> &NavigationOptions {
        &self.inner.options
    }

    pub fn bridge(&self) -> &HostBridge {
        &self.inner.bridge
    }

    /// `window.history`-shaped facade over this engine.
    pub fn history(&self) -> History {
        History::new(self.clone())
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn on_navigate<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NavigateEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.bus.on_navigate(listener)
    }

    pub fn on_navigate_success<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NavigateSuccessEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on_navigate_success(listener)
    }

    pub fn on_navigate_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NavigateErrorEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on_navigate_error(listener)
    }

    pub fn on_current_entry_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CurrentEntryChangeEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on_current_entry_change(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.bus.unsubscribe(id)
    }
}

impl std::fmt::Debug for Navigation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("Navigation")
            .field("current", &shared.entries.current().url())
            .field("index", &shared.entries.current_index())
            .field("len", &shared.entries.len())
            .field("phase", &shared.phase)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHistory;

    fn register() -> Navigation {
        let host = Arc::new(MemoryHistory::new("https://app.local/"));
        Navigation::register(host, NavigationOptions::new().commit_delay(Duration::ZERO))
    }

    #[test]
    fn test_default_options() {
        let options = NavigationOptions::default();
        assert!(!options.raise_history_pop_state);
        assert_eq!(options.commit_delay, Duration::from_millis(35));
        assert_eq!(options.echo_delay, Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_initial_entry_from_host() {
        let nav = register();
        assert_eq!(nav.entries().len(), 1);
        assert_eq!(nav.current_entry().url(), "https://app.local/");
        assert!(!nav.can_go_back());
        assert!(!nav.can_go_forward());
        assert_eq!(nav.phase(), DispatchPhase::Idle);
        assert!(nav.transition().is_none());
        nav.unregister();
    }

    #[tokio::test]
    async fn test_rejections_are_immediate() {
        let nav = register();

        let back = nav.back();
        assert!(matches!(
            back.finished.peek(),
            Some(Err(NavigationError::InitialState { .. }))
        ));

        let unknown = nav.traverse_to(&EntryKey::from("missing"), None);
        assert_eq!(
            unknown.committed.peek(),
            Some(Err(NavigationError::target_not_found("missing")))
        );

        let forward = nav.forward(None);
        assert!(matches!(
            forward.finished.peek(),
            Some(Err(NavigationError::TargetEntryNotFound { .. }))
        ));
        nav.unregister();
    }

    #[tokio::test]
    async fn test_requests_after_unregister_abort() {
        let nav = register();
        nav.unregister();
        assert!(!nav.is_registered());
        assert!(!nav.bridge().is_installed());

        let result = nav.navigate("/late", NavigateOptions::new());
        assert!(matches!(
            result.finished.await,
            Err(NavigationError::Aborted { .. })
        ));
    }
}
