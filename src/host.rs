//! The host history primitive the engine sits on.
//!
//! [`HistoryHost`] is the boundary to whatever really owns the navigation
//! stack: a browser `window.history` binding, a webview shell, or the
//! in-process [`MemoryHistory`]. The engine never assumes more than this
//! trait offers.
//!
//! # Implementing a host
//!
//! ```no_run
//! use futures_util::future::{self, BoxFuture};
//! use history_navigator::{HistoryHost, HostError, PopStateListener, PopStateListenerId};
//! use serde_json::Value;
//!
//! struct WebviewHistory;
//!
//! impl HistoryHost for WebviewHistory {
//!     fn location(&self) -> String { "https://app.local/".into() }
//!     fn push_state(&self, _state: Value, _url: &str) -> Result<(), HostError> { Ok(()) }
//!     fn replace_state(&self, _state: Value, _url: &str) -> Result<(), HostError> { Ok(()) }
//!     fn go(&self, _delta: isize) -> BoxFuture<'static, Result<(), HostError>> {
//!         Box::pin(future::ready(Ok(())))
//!     }
//!     fn reload(&self) {}
//!     fn add_pop_state_listener(&self, _listener: PopStateListener) -> PopStateListenerId {
//!         PopStateListenerId::new(0)
//!     }
//!     fn remove_pop_state_listener(&self, _id: PopStateListenerId) {}
//!     fn dispatch_pop_state(&self, _event: history_navigator::PopStateEvent) {}
//! }
//! ```

use crate::{debug_log, HostError};
use futures_util::future::{self, BoxFuture};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// "The stack changed underneath you" notification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopStateEvent {
    /// History state stored with the entry the host moved to.
    pub state: Option<Value>,
}

/// Callback for host notifications.
pub type PopStateListener = Arc<dyn Fn(&PopStateEvent) + Send + Sync>;

/// Registration handle for a [`PopStateListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopStateListenerId(u64);

impl PopStateListenerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Host collaborator contract.
pub trait HistoryHost: Send + Sync + 'static {
    /// Absolute URL of the host's current entry.
    fn location(&self) -> String;

    /// Append an entry after the current one, dropping forward entries.
    fn push_state(&self, state: Value, url: &str) -> Result<(), HostError>;

    /// Overwrite the current entry.
    fn replace_state(&self, state: Value, url: &str) -> Result<(), HostError>;

    /// Move by `delta`. Resolves once the host has moved.
    fn go(&self, delta: isize) -> BoxFuture<'static, Result<(), HostError>>;

    fn back(&self) -> BoxFuture<'static, Result<(), HostError>> {
        self.go(-1)
    }

    fn forward(&self) -> BoxFuture<'static, Result<(), HostError>> {
        self.go(1)
    }

    /// Full reload of the current location.
    fn reload(&self);

    fn add_pop_state_listener(&self, listener: PopStateListener) -> PopStateListenerId;

    fn remove_pop_state_listener(&self, id: PopStateListenerId);

    /// Deliver `event` to every registered listener.
    fn dispatch_pop_state(&self, event: PopStateEvent);
}

#[derive(Debug)]
struct Slot {
    state: Option<Value>,
    url: String,
}

#[derive(Debug)]
struct Stack {
    slots: Vec<Slot>,
    index: usize,
}

/// In-process host stack.
///
/// Behaves like a browser session history: `push_state`/`replace_state` are
/// silent, while `go` moves and then notifies listeners with the state stored
/// at the destination. Moves outside the stack are ignored.
///
/// # Example
///
/// ```
/// use history_navigator::{HistoryHost, MemoryHistory};
///
/// let host = MemoryHistory::new("https://app.local/");
/// host.push_state(serde_json::Value::Null, "https://app.local/a").unwrap();
/// assert_eq!(host.length(), 2);
/// pollster::block_on(host.go(-1)).unwrap();
/// assert_eq!(host.location(), "https://app.local/");
/// ```
pub struct MemoryHistory {
    stack: Mutex<Stack>,
    listeners: Mutex<Vec<(PopStateListenerId, PopStateListener)>>,
    next_listener: AtomicU64,
    reloads: AtomicUsize,
}

impl MemoryHistory {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            stack: Mutex::new(Stack {
                slots: vec![Slot {
                    state: None,
                    url: initial_url.into(),
                }],
                index: 0,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            reloads: AtomicUsize::new(0),
        }
    }

    pub fn length(&self) -> usize {
        self.stack.lock().slots.len()
    }

    pub fn index(&self) -> usize {
        self.stack.lock().index
    }

    /// State stored with the current slot.
    pub fn state(&self) -> Option<Value> {
        let stack = self.stack.lock();
        stack.slots[stack.index].state.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl HistoryHost for MemoryHistory {
    fn location(&self) -> String {
        let stack = self.stack.lock();
        stack.slots[stack.index].url.clone()
    }

    fn push_state(&self, state: Value, url: &str) -> Result<(), HostError> {
        let mut stack = self.stack.lock();
        let keep = stack.index + 1;
        stack.slots.truncate(keep);
        stack.slots.push(Slot {
            state: Some(state),
            url: url.to_string(),
        });
        stack.index = stack.slots.len() - 1;
        Ok(())
    }

    fn replace_state(&self, state: Value, url: &str) -> Result<(), HostError> {
        let mut stack = self.stack.lock();
        let index = stack.index;
        stack.slots[index] = Slot {
            state: Some(state),
            url: url.to_string(),
        };
        Ok(())
    }

    fn go(&self, delta: isize) -> BoxFuture<'static, Result<(), HostError>> {
        let moved = {
            let mut stack = self.stack.lock();
            match stack.index.checked_add_signed(delta) {
                Some(target) if delta != 0 && target < stack.slots.len() => {
                    stack.index = target;
                    Some(stack.slots[target].state.clone())
                }
                _ => None,
            }
        };

        match moved {
            Some(state) => self.dispatch_pop_state(PopStateEvent { state }),
            None => {
                debug_log!("memory history ignored go({})", delta);
            }
        }
        Box::pin(future::ready(Ok(())))
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn add_pop_state_listener(&self, listener: PopStateListener) -> PopStateListenerId {
        let id = PopStateListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    fn remove_pop_state_listener(&self, id: PopStateListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    fn dispatch_pop_state(&self, event: PopStateEvent) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_truncates_forward_slots() {
        let host = MemoryHistory::new("https://app.local/");
        host.push_state(json!(1), "https://app.local/a").unwrap();
        host.push_state(json!(2), "https://app.local/b").unwrap();
        pollster::block_on(host.go(-2)).unwrap();

        host.push_state(json!(3), "https://app.local/c").unwrap();
        assert_eq!(host.length(), 2);
        assert_eq!(host.location(), "https://app.local/c");
    }

    #[test]
    fn test_go_notifies_with_destination_state() {
        let host = MemoryHistory::new("https://app.local/");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        host.add_pop_state_listener(Arc::new(move |ev: &PopStateEvent| {
            sink.lock().push(ev.state.clone());
        }));

        host.push_state(json!("a"), "https://app.local/a").unwrap();
        host.push_state(json!("b"), "https://app.local/b").unwrap();
        assert!(seen.lock().is_empty());

        pollster::block_on(host.back()).unwrap();
        pollster::block_on(host.forward()).unwrap();
        assert_eq!(*seen.lock(), vec![Some(json!("a")), Some(json!("b"))]);
    }

    #[test]
    fn test_go_out_of_range_is_silent() {
        let host = MemoryHistory::new("https://app.local/");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = host.add_pop_state_listener(Arc::new(move |_: &PopStateEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        pollster::block_on(host.go(-1)).unwrap();
        pollster::block_on(host.go(0)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(host.index(), 0);

        host.remove_pop_state_listener(id);
        assert_eq!(host.listener_count(), 0);
    }

    #[test]
    fn test_replace_and_reload() {
        let host = MemoryHistory::new("https://app.local/");
        host.replace_state(json!({"k": 1}), "https://app.local/r").unwrap();
        assert_eq!(host.length(), 1);
        assert_eq!(host.state(), Some(json!({"k": 1})));

        host.reload();
        assert_eq!(host.reload_count(), 1);
    }
}
