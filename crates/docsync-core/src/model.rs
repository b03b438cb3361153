//! Live connection status of one session
//!
//! Holds exactly one current [`ConnectionStatus`]. Every change is an
//! atomic replace checked against [`crate::state_machine`], numbered, and
//! delivered to observers in the order it was applied.

use crate::config::TransitionPolicy;
use crate::error::SessionError;
use crate::signal::{Signal, Subscription};
use crate::state_machine;
use crate::status::{ConnectionStatus, StatusChange};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatusState {
    current: ConnectionStatus,
    seq: u64,
    last: Option<StatusChange>,
}

/// Current status plus its observers
#[derive(Debug)]
pub struct StatusModel {
    state: Signal<StatusState>,
    policy: TransitionPolicy,
}

impl StatusModel {
    /// New model in `connecting` with the strict transition table
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(TransitionPolicy::Strict)
    }

    /// New model in `connecting` with the given policy
    #[must_use]
    pub fn with_policy(policy: TransitionPolicy) -> Self {
        Self {
            state: Signal::new(StatusState {
                current: ConnectionStatus::Connecting,
                seq: 0,
                last: None,
            }),
            policy,
        }
    }

    /// Transition policy in force
    #[must_use]
    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Current status
    #[must_use]
    pub fn current(&self) -> ConnectionStatus {
        self.state.with(|s| s.current)
    }

    /// Number of changes applied so far
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.state.with(|s| s.seq)
    }

    /// Replace the current status.
    ///
    /// Returns `Ok(None)` when `to` is already current. Under
    /// [`TransitionPolicy::Strict`] a transition outside the table is
    /// rejected and the status is left as it was.
    pub fn apply(&self, to: ConnectionStatus) -> Result<Option<StatusChange>, SessionError> {
        let policy = self.policy;
        let next = self.state.try_update(|state| {
            let from = state.current;
            if from == to {
                return Ok(None);
            }
            if let Err(err) = state_machine::validate_transition(from, to) {
                match policy {
                    TransitionPolicy::Strict => {
                        tracing::warn!(%from, %to, "rejected status transition");
                        return Err(SessionError::from(err));
                    }
                    TransitionPolicy::LastWriteWins => {
                        tracing::warn!(%from, %to, "accepting out-of-table status transition");
                    }
                }
            }
            let change = StatusChange {
                seq: state.seq + 1,
                from,
                to,
            };
            Ok(Some(StatusState {
                current: to,
                seq: change.seq,
                last: Some(change),
            }))
        })?;

        let change = next.and_then(|s| s.last);
        if let Some(change) = change {
            tracing::debug!(seq = change.seq, from = %change.from, to = %change.to, "status changed");
        }
        Ok(change)
    }

    /// Terminal transport failure: settle into `disconnected` from any state
    pub fn fail(&self) -> Option<StatusChange> {
        // `disconnected` is reachable from every other state.
        match self.apply(ConnectionStatus::Disconnected) {
            Ok(change) => change,
            Err(err) => {
                tracing::error!(error = %err, "failed to settle into disconnected");
                None
            }
        }
    }

    /// Explicit retry: `disconnected -> connecting`
    pub fn retry(&self) -> Result<StatusChange, SessionError> {
        let current = self.current();
        if current != ConnectionStatus::Disconnected {
            return Err(SessionError::RetryNotDisconnected(current));
        }
        self.apply(ConnectionStatus::Connecting)?
            .ok_or(SessionError::RetryNotDisconnected(ConnectionStatus::Connecting))
    }

    /// Observe every applied change, in order
    #[must_use = "dropping the subscription detaches the observer"]
    pub fn subscribe(
        &self,
        observer: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.state.subscribe(move |state| {
            if let Some(change) = &state.last {
                observer(change);
            }
        })
    }

    /// Ordered async stream of every change applied after this call
    #[must_use]
    pub fn watch(&self) -> StatusStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |change| {
            let _ = tx.send(*change);
        });
        StatusStream {
            rx,
            _subscription: subscription,
        }
    }

    /// Mirror `to` without consulting the table, e.g. when binding to a
    /// transport that is already past `connecting`
    pub(crate) fn force(&self, to: ConnectionStatus) -> Option<StatusChange> {
        let next = self
            .state
            .try_update(|state| {
                if state.current == to {
                    return Ok::<_, SessionError>(None);
                }
                let change = StatusChange {
                    seq: state.seq + 1,
                    from: state.current,
                    to,
                };
                Ok(Some(StatusState {
                    current: to,
                    seq: change.seq,
                    last: Some(change),
                }))
            })
            .ok()
            .flatten();
        next.and_then(|s| s.last)
    }

    /// Back to `connecting` with a fresh sequence, for a new document.
    ///
    /// Observers see the reset as a change numbered 0 from whatever they
    /// last saw; the next applied change is numbered 1 again. A model that
    /// never left its initial state resets silently.
    pub(crate) fn reset(&self) -> Option<StatusChange> {
        let next = self
            .state
            .try_update(|state| {
                if state.seq == 0 && state.current == ConnectionStatus::Connecting {
                    return Ok::<_, SessionError>(None);
                }
                Ok(Some(StatusState {
                    current: ConnectionStatus::Connecting,
                    seq: 0,
                    last: Some(StatusChange {
                        seq: 0,
                        from: state.current,
                        to: ConnectionStatus::Connecting,
                    }),
                }))
            })
            .ok()
            .flatten();
        next.and_then(|s| s.last)
    }
}

impl Default for StatusModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Async view of a [`StatusModel`]; dropping it detaches from the model
#[derive(Debug)]
pub struct StatusStream {
    rx: mpsc::UnboundedReceiver<StatusChange>,
    _subscription: Subscription,
}

impl StatusStream {
    /// Next change, or `None` once the model is gone
    pub async fn next_change(&mut self) -> Option<StatusChange> {
        self.rx.recv().await
    }

    /// Next change if one is already buffered
    pub fn try_next_change(&mut self) -> Option<StatusChange> {
        self.rx.try_recv().ok()
    }
}

impl Stream for StatusStream {
    type Item = StatusChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use ConnectionStatus::*;

    #[test]
    fn starts_connecting() {
        let model = StatusModel::new();
        assert_eq!(model.current(), Connecting);
        assert_eq!(model.seq(), 0);
    }

    #[test]
    fn same_status_is_a_no_op() {
        let model = StatusModel::new();
        assert_eq!(model.apply(Connecting).unwrap(), None);
        assert_eq!(model.seq(), 0);
    }

    #[test]
    fn rejected_transition_keeps_status() {
        let model = StatusModel::new();
        let err = model.apply(Synced).unwrap_err();
        assert!(matches!(err, SessionError::IllegalTransition { from: Connecting, to: Synced }));
        assert_eq!(model.current(), Connecting);
        assert_eq!(model.seq(), 0);
    }

    #[test]
    fn last_write_wins_accepts_anything() {
        let model = StatusModel::with_policy(TransitionPolicy::LastWriteWins);
        let change = model.apply(Publishing).unwrap().unwrap();
        assert_eq!(change, StatusChange { seq: 1, from: Connecting, to: Publishing });
        assert_eq!(model.current(), Publishing);
    }

    #[test]
    fn fail_then_retry() {
        let model = StatusModel::new();
        model.apply(Connected).unwrap();
        let change = model.fail().unwrap();
        assert_eq!(change.to, Disconnected);

        assert!(model.apply(Reconnecting).is_err());
        let retry = model.retry().unwrap();
        assert_eq!(retry, StatusChange { seq: 3, from: Disconnected, to: Connecting });
    }

    #[test]
    fn retry_requires_disconnected() {
        let model = StatusModel::new();
        assert!(matches!(
            model.retry(),
            Err(SessionError::RetryNotDisconnected(Connecting))
        ));
    }

    #[test]
    fn fail_twice_reports_once() {
        let model = StatusModel::new();
        assert!(model.fail().is_some());
        assert!(model.fail().is_none());
    }

    #[test]
    fn observers_see_changes_not_rejections() {
        let model = StatusModel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = model.subscribe(move |c| sink.lock().push(c.to));

        model.apply(Connected).unwrap();
        let _ = model.apply(Publishing);
        model.apply(Syncing).unwrap();

        assert_eq!(*seen.lock(), vec![Connected, Syncing]);
    }

    #[test]
    fn reset_is_observed_as_a_new_sequence() {
        let model = StatusModel::new();
        model.apply(Connected).unwrap();
        model.fail();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = model.subscribe(move |c| sink.lock().push(*c));

        let reset = model.reset().unwrap();
        assert_eq!(reset, StatusChange { seq: 0, from: Disconnected, to: Connecting });
        assert_eq!(model.current(), Connecting);
        assert_eq!(model.seq(), 0);

        model.apply(Connected).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                StatusChange { seq: 0, from: Disconnected, to: Connecting },
                StatusChange { seq: 1, from: Connecting, to: Connected },
            ]
        );
    }

    #[test]
    fn reset_of_untouched_model_is_silent() {
        let model = StatusModel::new();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let _sub = model.subscribe(move |_| *sink.lock() += 1);

        assert_eq!(model.reset(), None);
        assert_eq!(*seen.lock(), 0);
    }

    #[tokio::test]
    async fn watch_yields_changes_in_order() {
        let model = StatusModel::new();
        let mut stream = model.watch();

        model.apply(Connected).unwrap();
        model.apply(Syncing).unwrap();
        model.apply(Synced).unwrap();

        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(stream.next_change().await.unwrap().to);
        }
        assert_eq!(got, vec![Connected, Syncing, Synced]);
        assert!(stream.try_next_change().is_none());
    }
}
