//! Completion signals and cooperative cancellation.
//!
//! A transition owns two settle-once [`Signal`]s, `committed` and `finished`.
//! Callers only ever see the receiving half, a [`Completion`], which can be
//! cloned and awaited any number of times, like a promise.
//!
//! [`AbortSignal`] is the cancellation token handed to intercept handlers. It
//! is cooperative: the engine settles an aborted transition whether or not the
//! handler ever looks at it.

use crate::NavigationError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};

type Outcome = Option<Result<(), NavigationError>>;

/// Sending half of a completion. The first settle wins.
#[derive(Debug)]
pub(crate) struct Signal {
    tx: watch::Sender<Outcome>,
}

impl Signal {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Settle with `outcome`. Returns `false` if already settled.
    fn settle(&self, outcome: Result<(), NavigationError>) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        })
    }

    pub(crate) fn resolve(&self) -> bool {
        self.settle(Ok(()))
    }

    pub(crate) fn reject(&self, err: NavigationError) -> bool {
        self.settle(Err(err))
    }

    pub(crate) fn outcome(&self) -> Outcome {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> Completion {
        Completion {
            rx: self.tx.subscribe(),
        }
    }
}

/// Awaitable outcome of one phase of a transition.
///
/// ```
/// # async fn demo(nav: history_navigator::Navigation) {
/// let result = nav.navigate("/orders", Default::default());
/// result.committed.clone().await.ok();
/// if let Err(err) = result.finished.await {
///     eprintln!("navigation failed: {err}");
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Completion {
    rx: watch::Receiver<Outcome>,
}

impl Completion {
    /// A completion that is already settled with `outcome`.
    pub(crate) fn settled(outcome: Result<(), NavigationError>) -> Self {
        let signal = Signal::new();
        signal.settle(outcome);
        signal.subscribe()
    }

    /// The outcome, if settled.
    pub fn peek(&self) -> Option<Result<(), NavigationError>> {
        self.rx.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the outcome.
    pub async fn wait(mut self) -> Result<(), NavigationError> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(Ok(())),
            // The engine dropped the transition without settling it.
            Err(_) => Err(NavigationError::aborted("transition dropped")),
        }
    }
}

impl IntoFuture for Completion {
    type Output = Result<(), NavigationError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}

/// The `{committed, finished}` pair returned by every navigation call.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// Settles once the entry list (and host stack) reflect the move.
    pub committed: Completion,
    /// Settles once events were announced and interceptors completed.
    pub finished: Completion,
}

impl NavigationResult {
    pub(crate) fn new(committed: &Signal, finished: &Signal) -> Self {
        Self {
            committed: committed.subscribe(),
            finished: finished.subscribe(),
        }
    }

    /// Both completions already rejected with `err`.
    pub(crate) fn rejected(err: NavigationError) -> Self {
        Self {
            committed: Completion::settled(Err(err.clone())),
            finished: Completion::settled(Err(err)),
        }
    }

    /// Both completions already resolved.
    pub(crate) fn resolved() -> Self {
        Self {
            committed: Completion::settled(Ok(())),
            finished: Completion::settled(Ok(())),
        }
    }
}

/// Cancellation token for one transition.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

#[derive(Debug, Default)]
struct AbortInner {
    aborted: AtomicBool,
    notify: Notify,
}

impl AbortSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Resolves once the transition is aborted.
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn abort(&self) {
        if !self.inner.aborted.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_settle_wins() {
        let signal = Signal::new();
        let completion = signal.subscribe();
        assert!(!completion.is_settled());

        assert!(signal.resolve());
        assert!(!signal.reject(NavigationError::AbortedBySupersedingTransition));

        assert_eq!(completion.peek(), Some(Ok(())));
        assert_eq!(pollster::block_on(completion.wait()), Ok(()));
    }

    #[test]
    fn test_rejected_pair() {
        let result = NavigationResult::rejected(NavigationError::target_not_found("k"));
        let expected = Err(NavigationError::target_not_found("k"));
        assert_eq!(pollster::block_on(result.committed.wait()), expected);
        assert_eq!(pollster::block_on(result.finished.wait()), expected);
    }

    #[test]
    fn test_dropped_signal_reports_abort() {
        let signal = Signal::new();
        let completion = signal.subscribe();
        drop(signal);
        let outcome = pollster::block_on(completion.wait());
        assert!(matches!(outcome, Err(NavigationError::Aborted { .. })));
    }

    #[tokio::test]
    async fn test_completion_awaited_twice() {
        let signal = Signal::new();
        let first = signal.subscribe();
        let second = first.clone();

        let waiter = tokio::spawn(first.wait());
        signal.reject(NavigationError::AbortedBySupersedingTransition);

        assert_eq!(
            waiter.await.unwrap(),
            Err(NavigationError::AbortedBySupersedingTransition)
        );
        assert_eq!(
            second.await,
            Err(NavigationError::AbortedBySupersedingTransition)
        );
    }

    #[tokio::test]
    async fn test_abort_signal_wakes_waiter() {
        let signal = AbortSignal::new();
        let observer = signal.clone();
        let waiter = tokio::spawn(async move { observer.aborted().await });

        tokio::task::yield_now().await;
        signal.abort();
        waiter.await.unwrap();
        assert!(signal.is_aborted());
    }
}
