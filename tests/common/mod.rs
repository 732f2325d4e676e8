//! Test utilities for navigation engine tests
//!
//! Provides a registered engine over an in-memory host plus an event recorder.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use history_navigator::*;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const ORIGIN: &str = "https://app.local/";

/// Route engine logs to the test output (`RUST_LOG=history_navigator=trace`).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Engine registered on a fresh [`MemoryHistory`] at [`ORIGIN`].
pub fn setup() -> (Navigation, Arc<MemoryHistory>) {
    setup_with(NavigationOptions::default())
}

pub fn setup_with(options: NavigationOptions) -> (Navigation, Arc<MemoryHistory>) {
    init_logging();
    let host = Arc::new(MemoryHistory::new(ORIGIN));
    let nav = Navigation::register(host.clone(), options);
    (nav, host)
}

/// Engine registered on a [`SlowHistory`] whose moves take `delay`.
pub fn setup_slow(delay: Duration) -> (Navigation, Arc<MemoryHistory>) {
    init_logging();
    let host = Arc::new(MemoryHistory::new(ORIGIN));
    let slow = Arc::new(SlowHistory {
        inner: host.clone(),
        delay,
    });
    let nav = Navigation::register(slow, NavigationOptions::default());
    (nav, host)
}

/// Host whose `go` lands after a delay, like a browser traversal.
///
/// The move is scheduled when `go` is called and happens even if the caller
/// stops waiting for it.
pub struct SlowHistory {
    inner: Arc<MemoryHistory>,
    delay: Duration,
}

impl HistoryHost for SlowHistory {
    fn location(&self) -> String {
        self.inner.location()
    }

    fn push_state(&self, state: Value, url: &str) -> Result<(), HostError> {
        self.inner.push_state(state, url)
    }

    fn replace_state(&self, state: Value, url: &str) -> Result<(), HostError> {
        self.inner.replace_state(state, url)
    }

    fn go(&self, delta: isize) -> BoxFuture<'static, Result<(), HostError>> {
        let host = self.inner.clone();
        let delay = self.delay;
        let moved = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            host.go(delta).await
        });
        Box::pin(async move {
            moved
                .await
                .map_err(|err| HostError::new(err.to_string()))?
        })
    }

    fn reload(&self) {
        self.inner.reload();
    }

    fn add_pop_state_listener(&self, listener: PopStateListener) -> PopStateListenerId {
        self.inner.add_pop_state_listener(listener)
    }

    fn remove_pop_state_listener(&self, id: PopStateListenerId) {
        self.inner.remove_pop_state_listener(id);
    }

    fn dispatch_pop_state(&self, event: PopStateEvent) {
        self.inner.dispatch_pop_state(event);
    }
}

/// Model and host agree on position, length and location.
pub fn assert_in_step(nav: &Navigation, host: &MemoryHistory) {
    assert_eq!(nav.entries().len(), host.length(), "entry count");
    assert_eq!(nav.current_index(), host.index(), "current index");
    assert_eq!(nav.current_entry().url(), host.location(), "location");
}

/// Let the dispatcher drain its mailbox and pending timers.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

/// Absolute URL under [`ORIGIN`].
pub fn url(path: &str) -> String {
    format!("{}{}", ORIGIN.trim_end_matches('/'), path)
}

pub fn urls(nav: &Navigation) -> Vec<String> {
    nav.entries().iter().map(|e| e.url().to_string()).collect()
}

/// Navigate and wait for `finished`, panicking on failure.
pub async fn go_to(nav: &Navigation, path: &str) {
    nav.navigate(path, NavigateOptions::new())
        .finished
        .await
        .unwrap_or_else(|err| panic!("navigate to {path} failed: {err}"));
}

/// Records every event delivered by the bus, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn attach(nav: &Navigation) -> Self {
        let recorder = Self::default();

        let log = recorder.log.clone();
        nav.on_current_entry_change(move |ev| {
            log.lock()
                .push(format!("currententrychange:{}", ev.navigation_type));
        });
        let log = recorder.log.clone();
        nav.on_navigate(move |ev| {
            log.lock().push(format!("navigate:{}", ev.navigation_type()));
            Ok(())
        });
        let log = recorder.log.clone();
        nav.on_navigate_success(move |ev| {
            log.lock()
                .push(format!("navigatesuccess:{}", ev.navigation_type));
        });
        let log = recorder.log.clone();
        nav.on_navigate_error(move |ev| {
            log.lock().push(format!("navigateerror:{}", ev.error));
        });

        recorder
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}
