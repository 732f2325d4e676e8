//! Navigation lifecycle events and the bus that delivers them.
//!
//! | Event | Type | Cancelable |
//! |-------|------|------------|
//! | `currententrychange` | [`CurrentEntryChangeEvent`] | no |
//! | `navigate` | [`NavigateEvent`] | yes, for engine-initiated moves |
//! | `navigatesuccess` | [`NavigateSuccessEvent`] | no |
//! | `navigateerror` | [`NavigateErrorEvent`] | no |
//!
//! Listeners run synchronously on the dispatcher, in subscription order. A
//! listener may start another navigation; the call is queued and supersedes
//! the current transition once the current delivery returns.
//!
//! # Intercepting
//!
//! ```no_run
//! use history_navigator::{Navigation, NavigateEvent};
//!
//! fn install(nav: &Navigation) {
//!     nav.on_navigate(|event: &NavigateEvent| {
//!         if event.can_intercept() {
//!             event.intercept(|signal| async move {
//!                 // load the microfrontend for the new location
//!                 if signal.is_aborted() {
//!                     return Ok(());
//!                 }
//!                 Ok(())
//!             });
//!         }
//!         Ok(())
//!     });
//! }
//! ```

use crate::entry::HistoryEntry;
use crate::error::HandlerError;
use crate::signal::AbortSignal;
use crate::transition::NavigationType;
use crate::{trace_log, warn_log, NavigationError};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Result of an intercept handler.
pub type InterceptFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// `navigate` listener. Returning `Err` counts as a synchronous throw.
pub type NavigateListener = Arc<dyn Fn(&NavigateEvent) -> Result<(), HandlerError> + Send + Sync>;

/// `navigatesuccess` listener.
pub type SuccessListener = Arc<dyn Fn(&NavigateSuccessEvent) + Send + Sync>;

/// `navigateerror` listener.
pub type ErrorListener = Arc<dyn Fn(&NavigateErrorEvent) + Send + Sync>;

/// `currententrychange` listener.
pub type EntryChangeListener = Arc<dyn Fn(&CurrentEntryChangeEvent) + Send + Sync>;

/// Destination of a `navigate` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationDestination {
    pub url: String,
}

/// The cancelable, interceptable `navigate` event.
pub struct NavigateEvent {
    destination: NavigationDestination,
    navigation_type: NavigationType,
    can_intercept: bool,
    cancelable: bool,
    user_initiated: bool,
    info: Option<Value>,
    signal: AbortSignal,
    default_prevented: AtomicBool,
    interceptors: Mutex<Vec<InterceptFuture>>,
}

impl NavigateEvent {
    pub(crate) fn new(
        destination: String,
        navigation_type: NavigationType,
        can_intercept: bool,
        user_initiated: bool,
        info: Option<Value>,
        signal: AbortSignal,
    ) -> Self {
        Self {
            destination: NavigationDestination { url: destination },
            navigation_type,
            can_intercept,
            cancelable: !user_initiated,
            user_initiated,
            info,
            signal,
            default_prevented: AtomicBool::new(false),
            interceptors: Mutex::new(Vec::new()),
        }
    }

    pub fn destination(&self) -> &NavigationDestination {
        &self.destination
    }

    pub fn navigation_type(&self) -> NavigationType {
        self.navigation_type
    }

    /// `true` if the destination shares scheme, host and port with the entry
    /// being left.
    pub fn can_intercept(&self) -> bool {
        self.can_intercept
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// `true` for moves the host made on its own (e.g. the back button).
    pub fn user_initiated(&self) -> bool {
        self.user_initiated
    }

    /// Always `false`: fragment navigations are not distinguished.
    pub fn hash_change(&self) -> bool {
        false
    }

    pub fn info(&self) -> Option<&Value> {
        self.info.as_ref()
    }

    /// Cancellation token of the transition.
    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Cancel the transition. Ignored when the event is not cancelable.
    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.store(true, Ordering::SeqCst);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }

    /// Extend the transition with an async handler.
    ///
    /// The handler is started right away with the transition's
    /// [`AbortSignal`]; `finished` settles once every registered handler
    /// completes and rejects if any of them fails.
    pub fn intercept<F, Fut>(&self, handler: F)
    where
        F: FnOnce(AbortSignal) -> Fut,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let future = handler(self.signal.clone()).boxed();
        self.interceptors.lock().push(future);
    }

    pub(crate) fn take_interceptors(&self) -> Vec<InterceptFuture> {
        std::mem::take(&mut *self.interceptors.lock())
    }
}

impl std::fmt::Debug for NavigateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigateEvent")
            .field("destination", &self.destination)
            .field("navigation_type", &self.navigation_type)
            .field("can_intercept", &self.can_intercept)
            .field("cancelable", &self.cancelable)
            .field("default_prevented", &self.default_prevented())
            .finish_non_exhaustive()
    }
}

/// Announced after every commit and after `update_current_entry`.
#[derive(Debug, Clone)]
pub struct CurrentEntryChangeEvent {
    pub navigation_type: NavigationType,
    /// Entry that was current before the change.
    pub from: HistoryEntry,
}

/// Announced when a transition finished successfully.
#[derive(Debug, Clone)]
pub struct NavigateSuccessEvent {
    pub navigation_type: NavigationType,
    pub url: String,
}

/// Announced when a transition failed after it started.
#[derive(Debug, Clone)]
pub struct NavigateErrorEvent {
    pub error: NavigationError,
}

/// Handle returned by the `on_*` subscription methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Listeners {
    navigate: Vec<(ListenerId, NavigateListener)>,
    success: Vec<(ListenerId, SuccessListener)>,
    error: Vec<(ListenerId, ErrorListener)>,
    entry_change: Vec<(ListenerId, EntryChangeListener)>,
}

/// Outcome of delivering a `navigate` event.
#[derive(Debug)]
pub(crate) enum Delivery {
    Proceed,
    Cancelled(Option<HandlerError>),
}

/// Typed publish/subscribe surface.
///
/// Delivery snapshots the listener list first, so listeners may subscribe or
/// unsubscribe while an event is being delivered.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Listeners>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on_navigate<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NavigateEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.listeners.lock().navigate.push((id, Arc::new(listener)));
        id
    }

    pub fn on_navigate_success<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NavigateSuccessEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.listeners.lock().success.push((id, Arc::new(listener)));
        id
    }

    pub fn on_navigate_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NavigateErrorEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.listeners.lock().error.push((id, Arc::new(listener)));
        id
    }

    pub fn on_current_entry_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CurrentEntryChangeEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.listeners.lock().entry_change.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener of any kind. Returns `false` if it was not found.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.navigate.len()
            + listeners.success.len()
            + listeners.error.len()
            + listeners.entry_change.len();
        listeners.navigate.retain(|(lid, _)| *lid != id);
        listeners.success.retain(|(lid, _)| *lid != id);
        listeners.error.retain(|(lid, _)| *lid != id);
        listeners.entry_change.retain(|(lid, _)| *lid != id);
        let after = listeners.navigate.len()
            + listeners.success.len()
            + listeners.error.len()
            + listeners.entry_change.len();
        trace_log!("unsubscribe {:?}: removed={}", id, before != after);
        before != after
    }

    /// Deliver `navigate` to every listener.
    ///
    /// All listeners run even after one fails; the first failure is kept.
    pub(crate) fn dispatch_navigate(&self, event: &NavigateEvent) -> Delivery {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .navigate
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let mut failure = None;
        for listener in listeners {
            if let Err(err) = listener(event) {
                failure.get_or_insert(err);
            }
        }

        if !event.cancelable() {
            if let Some(err) = failure {
                warn_log!("listener failed on non-cancelable navigate: {}", err);
            }
            return Delivery::Proceed;
        }
        if failure.is_some() || event.default_prevented() {
            return Delivery::Cancelled(failure);
        }
        Delivery::Proceed
    }

    pub(crate) fn dispatch_success(&self, event: &NavigateSuccessEvent) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .success
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub(crate) fn dispatch_error(&self, event: &NavigateErrorEvent) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .error
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub(crate) fn dispatch_entry_change(&self, event: &CurrentEntryChangeEvent) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .entry_change
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}
