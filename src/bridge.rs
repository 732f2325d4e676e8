//! Reconciliation between the modeled history and the host stack.
//!
//! [`HostBridge`] is installed on a [`HistoryHost`] at registration. It
//! captures the raw host, subscribes to its notifications and forwards them to
//! the dispatcher, and performs the stack mutations of the commit phase.
//! [`HostBridge::restore`] undoes the installation.
//!
//! [`History`] is the `window.history`-shaped facade application code should
//! call instead of the raw host. While the bridge is installed its calls are
//! funneled into the engine as ordinary transitions, so the modeled list and
//! the host stack cannot drift apart; after `restore` it talks to the raw host
//! directly.

use crate::dispatcher::Command;
use crate::entry::EntrySnapshot;
use crate::host::{HistoryHost, PopStateEvent, PopStateListener, PopStateListenerId};
use crate::location;
use crate::navigation::{Navigation, NavigationOptions};
use crate::signal::{NavigationResult, Signal};
use crate::transition::{HistoryBehavior, NavigateOptions};
use crate::{debug_log, trace_log, HostError, NavigationError};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Installed adapter over the raw host.
pub struct HostBridge {
    raw: Arc<dyn HistoryHost>,
    subscription: Mutex<Option<PopStateListenerId>>,
    raise_pop_state: bool,
    echo_delay: Duration,
}

impl HostBridge {
    pub(crate) fn install(
        raw: Arc<dyn HistoryHost>,
        options: &NavigationOptions,
        mailbox: UnboundedSender<Command>,
    ) -> Self {
        let listener: PopStateListener = Arc::new(move |event: &PopStateEvent| {
            if mailbox.send(Command::HostChanged(event.clone())).is_err() {
                trace_log!("host notification after shutdown dropped");
            }
        });
        let id = raw.add_pop_state_listener(listener);
        debug_log!(
            "host bridge installed (raise_history_pop_state={})",
            options.raise_history_pop_state
        );

        Self {
            raw,
            subscription: Mutex::new(Some(id)),
            raise_pop_state: options.raise_history_pop_state,
            echo_delay: options.echo_delay,
        }
    }

    /// Detach from the host. Returns `false` if already restored.
    pub fn restore(&self) -> bool {
        match self.subscription.lock().take() {
            Some(id) => {
                self.raw.remove_pop_state_listener(id);
                debug_log!("host bridge restored");
                true
            }
            None => false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// The host captured at install time.
    pub fn raw(&self) -> &Arc<dyn HistoryHost> {
        &self.raw
    }

    pub(crate) fn location(&self) -> String {
        self.raw.location()
    }

    /// Tag the host's current slot with the initial entry, silently.
    pub(crate) fn seed(&self, snapshot: &EntrySnapshot) -> Result<(), HostError> {
        self.raw
            .replace_state(snapshot.to_host_state()?, &snapshot.url)
    }

    /// Push `snapshot`. Returns `true` if a notification for it will follow.
    pub(crate) fn push(&self, snapshot: &EntrySnapshot) -> Result<bool, HostError> {
        self.raw.push_state(snapshot.to_host_state()?, &snapshot.url)?;
        Ok(self.echo(snapshot))
    }

    /// Replace with `snapshot`. Returns `true` if a notification will follow.
    pub(crate) fn replace(&self, snapshot: &EntrySnapshot) -> Result<bool, HostError> {
        self.raw
            .replace_state(snapshot.to_host_state()?, &snapshot.url)?;
        Ok(self.echo(snapshot))
    }

    /// Move the host by `delta` onto `target`. Returns `true` if a
    /// compatibility notification follows the host's own.
    pub(crate) async fn traverse(
        &self,
        delta: isize,
        target: &EntrySnapshot,
    ) -> Result<bool, HostError> {
        self.raw.go(delta).await?;
        Ok(self.echo(target))
    }

    pub(crate) fn reload(&self) {
        self.raw.reload();
    }

    /// Compatibility mode: redispatch a notification for our own mutation.
    fn echo(&self, snapshot: &EntrySnapshot) -> bool {
        if !self.raise_pop_state {
            return false;
        }
        let state = match snapshot.to_host_state() {
            Ok(state) => state,
            Err(err) => {
                debug_log!("echo skipped, snapshot not serializable: {}", err);
                return false;
            }
        };
        let host = Arc::clone(&self.raw);
        let delay = self.echo_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            host.dispatch_pop_state(PopStateEvent { state: Some(state) });
        });
        true
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("installed", &self.is_installed())
            .field("raise_pop_state", &self.raise_pop_state)
            .finish_non_exhaustive()
    }
}

/// `window.history`-shaped entry points.
///
/// # Example
///
/// ```no_run
/// # async fn demo(nav: history_navigator::Navigation) {
/// let history = nav.history();
/// history.push_state(None, "./checkout").finished.await.ok();
/// history.back().finished.await.ok();
/// # }
/// ```
#[derive(Clone)]
pub struct History {
    navigation: Navigation,
}

impl History {
    pub(crate) fn new(navigation: Navigation) -> Self {
        Self { navigation }
    }

    fn routed(&self) -> bool {
        self.navigation.bridge().is_installed()
    }

    fn raw(&self) -> &Arc<dyn HistoryHost> {
        self.navigation.bridge().raw()
    }

    pub fn push_state(&self, state: Option<Value>, url: &str) -> NavigationResult {
        if self.routed() {
            return self.navigation.navigate(
                url,
                NavigateOptions {
                    state,
                    history: HistoryBehavior::Push,
                    ..NavigateOptions::default()
                },
            );
        }
        let url = location::resolve(&self.raw().location(), url).unwrap_or_else(|_| url.to_string());
        settled(self.raw().push_state(state.unwrap_or(Value::Null), &url))
    }

    pub fn replace_state(&self, state: Option<Value>, url: &str) -> NavigationResult {
        if self.routed() {
            return self.navigation.navigate(
                url,
                NavigateOptions {
                    state,
                    history: HistoryBehavior::Replace,
                    ..NavigateOptions::default()
                },
            );
        }
        let url = location::resolve(&self.raw().location(), url).unwrap_or_else(|_| url.to_string());
        settled(self.raw().replace_state(state.unwrap_or(Value::Null), &url))
    }

    /// Move by `delta`; `go(0)` reloads.
    pub fn go(&self, delta: isize) -> NavigationResult {
        if !self.routed() {
            if delta == 0 {
                self.raw().reload();
                return NavigationResult::resolved();
            }
            return spawn_raw_move(Arc::clone(self.raw()), delta);
        }
        if delta == 0 {
            return self.navigation.reload(None);
        }
        match self.navigation.entry_at(delta) {
            Some(entry) => self.navigation.traverse_to(entry.key(), None),
            None => NavigationResult::rejected(NavigationError::target_not_found(format!(
                "offset {delta}"
            ))),
        }
    }

    pub fn back(&self) -> NavigationResult {
        if self.routed() {
            self.navigation.back()
        } else {
            self.go(-1)
        }
    }

    pub fn forward(&self) -> NavigationResult {
        if self.routed() {
            self.navigation.forward(None)
        } else {
            self.go(1)
        }
    }
}

/// Host-shaped view of the facade.
///
/// Code written against [`HistoryHost`] can be handed an
/// `Arc::new(navigation.history())` instead of the raw host; its stack
/// mutations then become engine transitions. Only rejections known up front
/// (an unresolvable URL, an unregistered engine) surface as errors, like a
/// host that refuses the call. Notifications are the raw host's.
impl HistoryHost for History {
    fn location(&self) -> String {
        if self.routed() {
            self.navigation.current_entry().url().to_string()
        } else {
            self.raw().location()
        }
    }

    fn push_state(&self, state: Value, url: &str) -> Result<(), HostError> {
        refused(&History::push_state(self, non_null(state), url))
    }

    fn replace_state(&self, state: Value, url: &str) -> Result<(), HostError> {
        refused(&History::replace_state(self, non_null(state), url))
    }

    fn go(&self, delta: isize) -> BoxFuture<'static, Result<(), HostError>> {
        let committed = History::go(self, delta).committed;
        Box::pin(async move {
            committed
                .await
                .map_err(|err| HostError::new(err.to_string()))
        })
    }

    fn reload(&self) {
        History::go(self, 0);
    }

    fn add_pop_state_listener(&self, listener: PopStateListener) -> PopStateListenerId {
        self.raw().add_pop_state_listener(listener)
    }

    fn remove_pop_state_listener(&self, id: PopStateListenerId) {
        self.raw().remove_pop_state_listener(id);
    }

    fn dispatch_pop_state(&self, event: PopStateEvent) {
        self.raw().dispatch_pop_state(event);
    }
}

fn non_null(state: Value) -> Option<Value> {
    (!state.is_null()).then_some(state)
}

/// Error for a call that was rejected before reaching the engine or host.
fn refused(result: &NavigationResult) -> Result<(), HostError> {
    match result.committed.peek() {
        Some(Err(err)) => Err(HostError::new(err.to_string())),
        _ => Ok(()),
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("routed", &self.routed())
            .finish()
    }
}

fn settled(outcome: Result<(), HostError>) -> NavigationResult {
    match outcome {
        Ok(()) => NavigationResult::resolved(),
        Err(err) => NavigationResult::rejected(err.into()),
    }
}

fn spawn_raw_move(host: Arc<dyn HistoryHost>, delta: isize) -> NavigationResult {
    let committed = Signal::new();
    let finished = Signal::new();
    let result = NavigationResult::new(&committed, &finished);
    tokio::spawn(async move {
        match host.go(delta).await {
            Ok(()) => {
                committed.resolve();
                finished.resolve();
            }
            Err(err) => {
                let err = NavigationError::from(err);
                committed.reject(err.clone());
                finished.reject(err);
            }
        }
    });
    result
}
