//! Logging facade used throughout the engine.
//!
//! Every record is emitted under the [`TARGET`] target so embedders can filter
//! navigation chatter (`RUST_LOG=history_navigator=debug`). The backend is
//! picked at compile time:
//!
//! | Feature    | Backend         | Default |
//! |------------|-----------------|---------|
//! | `log`      | `log` crate     | yes     |
//! | `tracing`  | `tracing` crate | no      |
//!
//! The two features are mutually exclusive. With neither enabled the macros
//! expand to nothing.
//!
//! ```ignore
//! use history_navigator::{debug_log, warn_log};
//!
//! debug_log!("commit {:?} -> '{}'", navigation_type, url);
//! warn_log!("transition {} cancelled by listener", id);
//! ```

/// Log target shared by all engine records.
pub const TARGET: &str = "history_navigator";

/// Emit a **trace**-level record (echo suppression, listener bookkeeping).
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::trace!(target: $crate::logging::TARGET, $($arg)*);
    };
}

/// Emit a **debug**-level record (state-machine steps).
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::debug!(target: $crate::logging::TARGET, $($arg)*);
    };
}

/// Emit an **info**-level record (registration, settled transitions).
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::info!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::info!(target: $crate::logging::TARGET, $($arg)*);
    };
}

/// Emit a **warn**-level record (cancelled or failed transitions).
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::warn!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::warn!(target: $crate::logging::TARGET, $($arg)*);
    };
}

/// Emit an **error**-level record (host faults).
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::error!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::error!(target: $crate::logging::TARGET, $($arg)*);
    };
}
