//! # history-navigator
//!
//! A session-history navigation engine layered over a plain host history
//! stack (`push_state` / `replace_state` / `go` plus a "stack changed"
//! notification).
//!
//! The engine keeps its own model of the entry list and turns every move into
//! a transition with two awaitable completions, `committed` and `finished`.
//! Listeners observe a typed event stream and may cancel a move or extend it
//! with async handlers. Moves are serialized: a newer request supersedes the
//! one in flight, so callers never see two transitions interleave.
//!
//! ## Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`state`] | Entry list and dispatcher phase |
//! | [`transition`] | Requests, options and the in-flight view |
//! | [`events`] | `navigate`, `navigatesuccess`, `navigateerror`, `currententrychange` |
//! | [`host`] | The [`HistoryHost`] contract and [`MemoryHistory`] |
//! | [`bridge`] | Host reconciliation and the [`History`] facade |
//! | [`navigation`] | The [`Navigation`] service |
//!
//! ## Quick start
//!
//! ```no_run
//! use history_navigator::{MemoryHistory, NavigateOptions, Navigation, NavigationOptions};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let nav = Navigation::register(
//!     Arc::new(MemoryHistory::new("https://app.local/")),
//!     NavigationOptions::default(),
//! );
//!
//! nav.on_navigate(|event| {
//!     if event.destination().url.ends_with("/admin") {
//!         event.prevent_default();
//!     }
//!     Ok(())
//! });
//!
//! let result = nav.navigate("/orders", NavigateOptions::new());
//! result.committed.await.ok();
//! # }
//! ```
//!
//! ## Logging
//!
//! Records go to the `log` crate by default, or to `tracing` with
//! `--no-default-features --features tracing`. See [`logging`].

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod logging;

pub mod bridge;
mod dispatcher;
pub mod entry;
pub mod error;
pub mod events;
pub mod host;
pub mod link;
pub mod location;
pub mod navigation;
mod signal;
pub mod state;
pub mod transition;

pub use bridge::{History, HostBridge};
pub use entry::{EntryId, EntryKey, EntrySnapshot, HistoryEntry};
pub use error::{HandlerError, HostError, NavigationError};
pub use events::{
    CurrentEntryChangeEvent, EventBus, InterceptFuture, ListenerId, NavigateErrorEvent,
    NavigateEvent, NavigateSuccessEvent, NavigationDestination,
};
pub use host::{HistoryHost, MemoryHistory, PopStateEvent, PopStateListener, PopStateListenerId};
pub use link::LinkTarget;
pub use navigation::{Navigation, NavigationOptions};
pub use signal::{AbortSignal, Completion, NavigationResult};
pub use state::{DispatchPhase, EntryList};
pub use transition::{HistoryBehavior, NavigateOptions, NavigationType, Transition};
