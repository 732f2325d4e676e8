//! The single consumer of the navigation mailbox.
//!
//! Every navigation call and every host notification becomes a [`Command`] on
//! one unbounded channel. The dispatcher runs one transition at a time:
//!
//! 1. **Commit**: mutate the host stack through the bridge and the modeled
//!    [`EntryList`](crate::EntryList), then resolve `committed`.
//! 2. **Announce**: `currententrychange`, then the cancelable `navigate` event.
//! 3. **Settle**: wait for interceptors, announce `navigatesuccess` or
//!    `navigateerror`, then settle `finished`.
//!
//! While a transition is in flight the mailbox keeps being drained. A new
//! transition request supersedes the active one; host notifications caused by
//! the engine's own stack mutations are recognized and dropped.

use crate::entry::{EntryId, EntrySnapshot, HistoryEntry};
use crate::events::{
    CurrentEntryChangeEvent, Delivery, NavigateErrorEvent, NavigateEvent, NavigateSuccessEvent,
};
use crate::host::PopStateEvent;
use crate::location;
use crate::navigation::Inner;
use crate::state::{DispatchPhase, EntryList};
use crate::transition::{NavigationType, Target, TransitionRequest};
use crate::{debug_log, error_log, info_log, trace_log, warn_log, NavigationError};
use futures_util::future::try_join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Mailbox message.
#[derive(Debug)]
pub(crate) enum Command {
    Transition(TransitionRequest),
    HostChanged(PopStateEvent),
    UpdateCurrentEntry(Value),
}

/// Entries handed to the host whose notification has not come back yet.
#[derive(Debug, Default)]
struct EchoLedger {
    expected: VecDeque<EntryId>,
    /// Target of the host move currently being awaited.
    in_flight: Option<EntryId>,
}

impl EchoLedger {
    fn record(&mut self, id: EntryId) {
        self.expected.push_back(id);
    }

    /// Consume `id` and anything recorded before it.
    fn consume(&mut self, id: EntryId) -> bool {
        match self.expected.iter().position(|e| *e == id) {
            Some(pos) => {
                self.expected.drain(..=pos);
                true
            }
            None => false,
        }
    }

    fn forget(&mut self, id: EntryId) {
        self.expected.retain(|e| *e != id);
    }

    fn clear(&mut self) {
        self.expected.clear();
    }
}

/// What the commit step changed, for rolling back.
#[derive(Debug)]
enum Commit {
    Pushed,
    Replaced { previous: HistoryEntry },
    Traversed { delta: isize },
    Reloaded,
    /// Host moved first; nothing to compensate.
    Followed,
}

pub(crate) struct Dispatcher {
    inner: Arc<Inner>,
    echoes: Mutex<EchoLedger>,
}

impl Dispatcher {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            echoes: Mutex::new(EchoLedger::default()),
        }
    }

    pub(crate) async fn run(self, mut mailbox: UnboundedReceiver<Command>) {
        debug_log!("dispatcher started");
        let mut next = None;

        loop {
            let mut request = match next.take() {
                Some(request) => request,
                None => match self.receive(&mut mailbox).await {
                    Some(request) => request,
                    None => break,
                },
            };
            self.activate(&mut request);

            let interrupted = tokio::select! {
                biased;
                () = self.execute(&request) => None,
                incoming = self.receive(&mut mailbox) => Some(incoming),
            };

            let stop = match interrupted {
                None => false,
                Some(Some(newer)) => {
                    self.abort(&request, NavigationError::AbortedBySupersedingTransition);
                    next = Some(newer);
                    false
                }
                Some(None) => {
                    self.abort(&request, NavigationError::aborted("navigation unregistered"));
                    true
                }
            };
            self.deactivate(&request);
            if stop {
                break;
            }
        }

        debug_log!("dispatcher stopped");
    }

    /// Next transition request. Cancel-safe.
    async fn receive(&self, mailbox: &mut UnboundedReceiver<Command>) -> Option<TransitionRequest> {
        loop {
            match mailbox.recv().await? {
                Command::Transition(request) => {
                    self.inner.queued.fetch_sub(1, Ordering::SeqCst);
                    return Some(request);
                }
                Command::HostChanged(event) => {
                    if let Some(request) = self.host_changed(&event) {
                        return Some(request);
                    }
                }
                Command::UpdateCurrentEntry(state) => self.update_current_entry(state),
            }
        }
    }

    /// A newer request is waiting in the mailbox.
    ///
    /// Listeners run inside the dispatcher, so a `navigate()` issued from one
    /// is only seen here; the mailbox is not polled until the next await.
    fn superseded(&self) -> bool {
        self.inner.queued.load(Ordering::SeqCst) > 0
    }

    fn update_current_entry(&self, state: Value) {
        let from = {
            let mut shared = self.inner.shared.lock();
            let from = shared.entries.current().clone();
            shared.entries.update_state(Some(state));
            from
        };
        trace_log!("state of '{}' updated", from.url());
        self.inner.bus.dispatch_entry_change(&CurrentEntryChangeEvent {
            navigation_type: NavigationType::Replace,
            from,
        });
    }

    /// Turn a host notification into a request, unless it is our own echo.
    fn host_changed(&self, event: &PopStateEvent) -> Option<TransitionRequest> {
        let snapshot = event.state.as_ref().and_then(EntrySnapshot::from_host_state);

        {
            let mut echoes = self.echoes.lock();
            if let Some(snapshot) = &snapshot {
                if echoes.consume(snapshot.id) {
                    trace_log!("echo for entry {} suppressed", snapshot.id);
                    return None;
                }
            }
            echoes.clear();
        }

        let shared = self.inner.shared.lock();
        let entries = &shared.entries;
        if let Some(snapshot) = &snapshot {
            if snapshot.id == entries.current().id() {
                trace_log!("host notification for current entry ignored");
                return None;
            }
        }

        let known = snapshot
            .as_ref()
            .and_then(|s| entries.index_of(&s.key))
            .and_then(|index| entries.get(index));
        let location = self.inner.bridge.location();

        let (destination, entry, key) = match known {
            Some(entry) => (entry.url().to_string(), entry.clone(), Some(entry.key().clone())),
            None => {
                let state = match snapshot {
                    Some(snapshot) => snapshot.state,
                    None => event.state.clone(),
                };
                (location.clone(), HistoryEntry::new(location, state), None)
            }
        };
        debug_log!(
            "host moved to '{}' ({})",
            destination,
            if key.is_some() { "known entry" } else { "new entry" }
        );

        Some(TransitionRequest::new(
            NavigationType::Traverse,
            destination,
            entry,
            Target::Host { key },
            None,
        ))
    }

    fn activate(&self, request: &mut TransitionRequest) {
        let mut shared = self.inner.shared.lock();
        request.from = Some(shared.entries.current().clone());
        shared.phase = DispatchPhase::Committing;
        shared.transition = Some((request.id, request.view()));
        debug_log!(
            "transition #{} {} -> '{}' started",
            request.id,
            request.navigation_type,
            request.destination
        );
    }

    fn deactivate(&self, request: &TransitionRequest) {
        if request.committed.reject(NavigationError::aborted("transition ended early")) {
            warn_log!("transition #{} ended before commit", request.id);
        }
        if request.finished.reject(NavigationError::aborted("transition ended early")) {
            warn_log!("transition #{} ended without settling", request.id);
        }

        self.settle_view(request, DispatchPhase::Idle);

        let cancelled = matches!(request.finished.outcome(), Some(Err(ref err)) if err.is_cancelled());
        if request.navigation_type == NavigationType::Reload && !cancelled {
            debug_log!("reloading host");
            self.inner.bridge.reload();
        }
    }

    /// Drop the public view of `request` and move to `phase`.
    fn settle_view(&self, request: &TransitionRequest, phase: DispatchPhase) {
        let mut shared = self.inner.shared.lock();
        if matches!(&shared.transition, Some((id, _)) if *id == request.id) {
            shared.transition = None;
        }
        shared.phase = phase;
    }

    fn set_phase(&self, phase: DispatchPhase) {
        self.inner.shared.lock().phase = phase;
    }

    /// Settle `request` because something newer (or shutdown) took over.
    fn abort(&self, request: &TransitionRequest, error: NavigationError) {
        request.signal.abort();
        {
            let mut echoes = self.echoes.lock();
            if let Some(id) = echoes.in_flight.take() {
                echoes.forget(id);
            }
        }

        request.committed.reject(error.clone());
        self.settle_view(request, DispatchPhase::Settled);
        if request.finished.reject(error.clone()) {
            warn_log!("transition #{} aborted: {}", request.id, error);
            self.inner.bus.dispatch_error(&NavigateErrorEvent { error });
        }
    }

    fn from_entry(&self, request: &TransitionRequest) -> HistoryEntry {
        match &request.from {
            Some(from) => from.clone(),
            None => self.inner.shared.lock().entries.current().clone(),
        }
    }

    async fn execute(&self, request: &TransitionRequest) {
        let (commit, checkpoint) = match self.commit(request).await {
            Ok(committed) => committed,
            Err(error) => {
                warn_log!("transition #{} failed to commit: {}", request.id, error);
                request.committed.reject(error.clone());
                self.settle_view(request, DispatchPhase::Settled);
                request.finished.reject(error);
                return;
            }
        };
        request.committed.resolve();
        trace_log!("transition #{} committed", request.id);

        self.inner.bus.dispatch_entry_change(&CurrentEntryChangeEvent {
            navigation_type: request.navigation_type,
            from: self.from_entry(request),
        });
        if self.superseded() {
            self.abort(request, NavigationError::AbortedBySupersedingTransition);
            return;
        }

        self.set_phase(DispatchPhase::Dispatching);
        self.dispatch(request, commit, checkpoint).await;
    }

    /// Mutate host and model. Returns what changed plus the list as it was
    /// right before the model was touched.
    async fn commit(
        &self,
        request: &TransitionRequest,
    ) -> Result<(Commit, EntryList), NavigationError> {
        match (&request.target, request.navigation_type) {
            (Target::Current, NavigationType::Push) => {
                tokio::time::sleep(self.inner.options.commit_delay).await;
                let snapshot = {
                    let shared = self.inner.shared.lock();
                    request.entry.snapshot(shared.entries.current_index() + 1)
                };
                if self.inner.bridge.push(&snapshot)? {
                    self.echoes.lock().record(snapshot.id);
                }
                let checkpoint = self.apply(|entries| {
                    entries.push(request.entry.clone());
                    Ok(())
                })?;
                Ok((Commit::Pushed, checkpoint))
            }
            (Target::Current, NavigationType::Replace) => {
                tokio::time::sleep(self.inner.options.commit_delay).await;
                let (snapshot, previous, entry) = {
                    let shared = self.inner.shared.lock();
                    let previous = shared.entries.current().clone();
                    let mut entry = request.entry.clone();
                    entry.set_key(previous.key().clone());
                    (
                        entry.snapshot(shared.entries.current_index()),
                        previous,
                        entry,
                    )
                };
                if self.inner.bridge.replace(&snapshot)? {
                    self.echoes.lock().record(snapshot.id);
                }
                let checkpoint = self.apply(|entries| {
                    entries.replace(entry);
                    Ok(())
                })?;
                Ok((Commit::Replaced { previous }, checkpoint))
            }
            (Target::Current, NavigationType::Reload) => {
                let checkpoint = self.inner.shared.lock().entries.clone();
                Ok((Commit::Reloaded, checkpoint))
            }
            (Target::Key(key), _) => {
                let (delta, snapshot) = {
                    let shared = self.inner.shared.lock();
                    let index = shared
                        .entries
                        .index_of(key)
                        .ok_or_else(|| NavigationError::target_not_found(key.as_str()))?;
                    let target = shared
                        .entries
                        .get(index)
                        .ok_or_else(|| NavigationError::target_not_found(key.as_str()))?;
                    (
                        index as isize - shared.entries.current_index() as isize,
                        target.snapshot(index),
                    )
                };

                if delta != 0 {
                    self.move_host(delta, &snapshot).await?;
                }
                let checkpoint = self.apply(|entries| entries.traverse(key))?;
                Ok((Commit::Traversed { delta }, checkpoint))
            }
            (Target::Host { key }, _) => {
                let checkpoint = self.apply(|entries| match key {
                    Some(key) if entries.index_of(key).is_some() => entries.traverse(key),
                    _ => {
                        entries.push(request.entry.clone());
                        Ok(())
                    }
                })?;
                Ok((Commit::Followed, checkpoint))
            }
            (Target::Current, NavigationType::Traverse) => {
                Err(NavigationError::aborted("traversal without a target"))
            }
        }
    }

    /// Run `mutate` on the entry list under one lock, returning the list as
    /// it was before.
    fn apply<F>(&self, mutate: F) -> Result<EntryList, NavigationError>
    where
        F: FnOnce(&mut EntryList) -> Result<(), NavigationError>,
    {
        let mut shared = self.inner.shared.lock();
        let checkpoint = shared.entries.clone();
        mutate(&mut shared.entries)?;
        Ok(checkpoint)
    }

    /// Move the host, expecting its notification for `target`.
    async fn move_host(&self, delta: isize, target: &EntrySnapshot) -> Result<(), NavigationError> {
        {
            let mut echoes = self.echoes.lock();
            echoes.record(target.id);
            echoes.in_flight = Some(target.id);
        }
        let moved = self.inner.bridge.traverse(delta, target).await;

        let mut echoes = self.echoes.lock();
        echoes.in_flight = None;
        match moved {
            Ok(echoed) => {
                if echoed {
                    echoes.record(target.id);
                }
                Ok(())
            }
            Err(err) => {
                echoes.forget(target.id);
                Err(err.into())
            }
        }
    }

    async fn dispatch(&self, request: &TransitionRequest, commit: Commit, checkpoint: EntryList) {
        let from = self.from_entry(request);
        let event = NavigateEvent::new(
            request.destination.clone(),
            request.navigation_type,
            location::same_origin(from.url(), &request.destination),
            request.is_host_driven(),
            request.info.clone(),
            request.signal.clone(),
        );
        trace_log!("{:?}", event);

        let delivery = self.inner.bus.dispatch_navigate(&event);
        if self.superseded() {
            event.take_interceptors();
            debug_log!("transition #{} superseded by a listener", request.id);
            self.abort(request, NavigationError::AbortedBySupersedingTransition);
            return;
        }

        if let Delivery::Cancelled(reason) = delivery {
            event.take_interceptors();
            let error = NavigationError::cancelled(reason.as_ref());
            info_log!("transition #{} {}", request.id, error);
            self.roll_back(request, commit, checkpoint, error).await;
            return;
        }

        let interceptors = event.take_interceptors();
        if !interceptors.is_empty() {
            debug_log!(
                "transition #{} awaiting {} interceptor(s)",
                request.id,
                interceptors.len()
            );
            if let Err(err) = try_join_all(interceptors).await {
                let error = NavigationError::interceptor(&err);
                warn_log!("transition #{} {}", request.id, error);
                self.settle_view(request, DispatchPhase::Settled);
                self.inner.bus.dispatch_error(&NavigateErrorEvent {
                    error: error.clone(),
                });
                request.finished.reject(error);
                return;
            }
        }

        self.settle_view(request, DispatchPhase::Settled);
        self.inner.bus.dispatch_success(&NavigateSuccessEvent {
            navigation_type: request.navigation_type,
            url: request.destination.clone(),
        });
        request.finished.resolve();
        info_log!("transition #{} finished", request.id);
    }

    /// Undo a commit a listener cancelled.
    async fn roll_back(
        &self,
        request: &TransitionRequest,
        commit: Commit,
        checkpoint: EntryList,
        error: NavigationError,
    ) {
        let restore = match commit {
            Commit::Reloaded | Commit::Followed => None,
            _ => Some(checkpoint.current().clone()),
        };

        if let Some(restored) = &restore {
            let discarded = {
                let mut shared = self.inner.shared.lock();
                let discarded = shared.entries.current().clone();
                shared.entries = checkpoint.clone();
                if matches!(commit, Commit::Pushed) {
                    // The host push dropped the old forward entries and moving
                    // back leaves the pushed slot ahead of us. Mirror that.
                    shared.entries.set_forward(discarded.clone());
                }
                discarded
            };
            debug_log!(
                "transition #{} rolled back to '{}'",
                request.id,
                restored.url()
            );
            self.inner.bus.dispatch_entry_change(&CurrentEntryChangeEvent {
                navigation_type: request.navigation_type,
                from: discarded,
            });
        }

        self.settle_view(request, DispatchPhase::Settled);
        self.inner.bus.dispatch_error(&NavigateErrorEvent {
            error: error.clone(),
        });
        request.finished.reject(error);

        let compensated = match commit {
            Commit::Pushed => {
                let target = checkpoint.current().snapshot(checkpoint.current_index());
                self.move_host(-1, &target).await
            }
            Commit::Replaced { previous } => {
                let snapshot = previous.snapshot(checkpoint.current_index());
                self.inner
                    .bridge
                    .replace(&snapshot)
                    .map(|echoed| {
                        if echoed {
                            self.echoes.lock().record(snapshot.id);
                        }
                    })
                    .map_err(NavigationError::from)
            }
            Commit::Traversed { delta } if delta != 0 => {
                let target = checkpoint.current().snapshot(checkpoint.current_index());
                self.move_host(-delta, &target).await
            }
            _ => Ok(()),
        };
        if let Err(err) = compensated {
            error_log!(
                "transition #{}: host could not be restored: {}",
                request.id,
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_ledger_consumes_in_order() {
        let mut ledger = EchoLedger::default();
        let (a, b, c) = (EntryId::new(), EntryId::new(), EntryId::new());
        ledger.record(a);
        ledger.record(b);
        ledger.record(c);

        assert!(ledger.consume(b));
        assert!(!ledger.consume(a));
        assert!(ledger.consume(c));
        assert!(ledger.expected.is_empty());
    }

    #[test]
    fn test_echo_ledger_forget() {
        let mut ledger = EchoLedger::default();
        let id = EntryId::new();
        ledger.record(id);
        ledger.forget(id);
        assert!(!ledger.consume(id));

        ledger.record(id);
        ledger.clear();
        assert!(!ledger.consume(id));
    }
}
