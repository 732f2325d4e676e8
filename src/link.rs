//! Anchor-style navigation targets.

use crate::bridge::History;
use crate::signal::NavigationResult;

/// A link a shell can render and activate.
///
/// Activation goes through [`History::push_state`], so it is routed through
/// the engine while registered and straight to the host otherwise.
///
/// ```no_run
/// use history_navigator::{LinkTarget, Navigation};
///
/// # async fn demo(nav: Navigation) {
/// let link = LinkTarget::new("./settings");
/// link.activate(&nav.history()).finished.await.ok();
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    href: String,
}

impl LinkTarget {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// Follow the link.
    pub fn activate(&self, history: &History) -> NavigationResult {
        history.push_state(None, &self.href)
    }
}

impl From<&str> for LinkTarget {
    fn from(href: &str) -> Self {
        Self::new(href)
    }
}
