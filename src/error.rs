//! Error types for the navigation engine.
//!
//! - [`NavigationError`]: why a transition's `committed` or `finished`
//!   completion rejected. Also carried by `navigateerror` events.
//! - [`HostError`]: a failure reported by a [`HistoryHost`](crate::HistoryHost)
//!   primitive.
//! - [`HandlerError`]: what listeners and intercept handlers return to fail a
//!   transition.
//!
//! No variant is fatal to the engine: after any of them the dispatcher returns
//! to [`DispatchPhase::Idle`](crate::DispatchPhase::Idle) and accepts new
//! requests.
//!
//! # Examples
//!
//! ```
//! use history_navigator::NavigationError;
//!
//! let err = NavigationError::target_not_found("k-42");
//! assert_eq!(err.to_string(), "target entry not found: k-42");
//! assert!(!err.is_superseded());
//! ```

use thiserror::Error;

/// Boxed error returned by navigate listeners and intercept handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Reason a transition did not finish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// A newer transition started before this one settled.
    #[error("aborted - new navigation started")]
    AbortedBySupersedingTransition,

    /// The traversal target is not (or no longer) in the entry list.
    #[error("target entry not found: {key}")]
    TargetEntryNotFound { key: String },

    /// A `navigate` listener cancelled the event or failed.
    #[error("navigation cancelled by listener{}", fmt_reason(.reason))]
    CancelledByListener { reason: Option<String> },

    /// An intercept handler rejected.
    #[error("interceptor failed: {message}")]
    InterceptorFailure { message: String },

    /// There is no entry to move to from the current position.
    #[error("invalid state: {message}")]
    InitialState { message: String },

    /// The destination could not be resolved to an absolute URL.
    #[error("invalid destination '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Generic abort: host failure, internal fault, or shutdown.
    #[error("aborted: {reason}")]
    Aborted { reason: String },
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(": {r}"))
        .unwrap_or_default()
}

impl NavigationError {
    pub fn target_not_found(key: impl Into<String>) -> Self {
        Self::TargetEntryNotFound { key: key.into() }
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    pub(crate) fn cancelled(reason: Option<&HandlerError>) -> Self {
        Self::CancelledByListener {
            reason: reason.map(ToString::to_string),
        }
    }

    pub(crate) fn interceptor(err: &HandlerError) -> Self {
        Self::InterceptorFailure {
            message: err.to_string(),
        }
    }

    /// Check if the transition lost to a newer one.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::AbortedBySupersedingTransition)
    }

    /// Check if a listener cancelled the transition.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::CancelledByListener { .. })
    }
}

/// Failure reported by the host history primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host history error: {message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("history state is not serializable: {err}"))
    }
}

impl From<HostError> for NavigationError {
    fn from(err: HostError) -> Self {
        Self::aborted(err.message)
    }
}
