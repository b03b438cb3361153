//! Edits submitted while the session refuses input
//!
//! An edit is never dropped silently: it is accepted, queued, or handed
//! back with a reason the UI can show.

use crate::config::BlockedEditPolicy;
use crate::status::ConnectionStatus;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// An edit held while the session was blocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Submission order within the session
    pub seq: u64,
    /// Status at submission time
    pub blocked_in: ConnectionStatus,
    /// Opaque edit payload for the transport
    pub payload: Bytes,
}

/// Why an edit was handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The connection status refuses input
    #[error("editing is blocked while {0}")]
    Blocked(ConnectionStatus),
    /// The participant is a viewer
    #[error("read-only participant")]
    ReadOnlyRole,
    /// The pending queue is at capacity
    #[error("pending edit queue is full ({0} edits)")]
    QueueFull(usize),
}

/// Result of submitting an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Forward to the transport now
    Accepted(Bytes),
    /// Held until the session is editable again
    Queued {
        /// Edits now waiting, this one included
        pending: usize,
    },
    /// Not accepted; the payload is returned untouched
    Rejected {
        /// Why
        reason: RejectReason,
        /// The edit
        payload: Bytes,
    },
}

impl EditOutcome {
    /// True for [`EditOutcome::Accepted`]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, EditOutcome::Accepted(_))
    }
}

#[derive(Debug, Default)]
struct Queue {
    next_seq: u64,
    pending: VecDeque<PendingEdit>,
}

/// Holding area for blocked edits
#[derive(Debug)]
pub struct EditBuffer {
    policy: BlockedEditPolicy,
    queue: Mutex<Queue>,
}

impl EditBuffer {
    /// Empty buffer with `policy`
    #[must_use]
    pub fn new(policy: BlockedEditPolicy) -> Self {
        Self {
            policy,
            queue: Mutex::new(Queue::default()),
        }
    }

    /// Policy in force
    #[must_use]
    pub fn policy(&self) -> BlockedEditPolicy {
        self.policy
    }

    /// Route an edit submitted while blocked in `status`
    pub fn hold(&self, status: ConnectionStatus, payload: Bytes) -> EditOutcome {
        let capacity = match self.policy {
            BlockedEditPolicy::Reject => {
                return EditOutcome::Rejected {
                    reason: RejectReason::Blocked(status),
                    payload,
                };
            }
            BlockedEditPolicy::Queue { capacity } => capacity,
        };

        let mut queue = self.queue.lock();
        if queue.pending.len() >= capacity {
            tracing::warn!(capacity, "pending edit queue full");
            return EditOutcome::Rejected {
                reason: RejectReason::QueueFull(capacity),
                payload,
            };
        }
        queue.next_seq += 1;
        let seq = queue.next_seq;
        queue.pending.push_back(PendingEdit {
            seq,
            blocked_in: status,
            payload,
        });
        EditOutcome::Queued {
            pending: queue.pending.len(),
        }
    }

    /// Take every held edit in submission order
    pub fn drain(&self) -> Vec<PendingEdit> {
        self.queue.lock().pending.drain(..).collect()
    }

    /// Number of held edits
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// No held edits
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop held edits and restart numbering
    pub fn clear(&self) {
        *self.queue.lock() = Queue::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_policy_returns_payload() {
        let buffer = EditBuffer::new(BlockedEditPolicy::Reject);
        let outcome = buffer.hold(ConnectionStatus::Disconnected, Bytes::from_static(b"x"));
        assert_eq!(
            outcome,
            EditOutcome::Rejected {
                reason: RejectReason::Blocked(ConnectionStatus::Disconnected),
                payload: Bytes::from_static(b"x"),
            }
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn queue_policy_holds_until_capacity() {
        let buffer = EditBuffer::new(BlockedEditPolicy::Queue { capacity: 2 });
        let s = ConnectionStatus::Disconnected;
        assert_eq!(buffer.hold(s, Bytes::from_static(b"a")), EditOutcome::Queued { pending: 1 });
        assert_eq!(buffer.hold(s, Bytes::from_static(b"b")), EditOutcome::Queued { pending: 2 });
        assert!(matches!(
            buffer.hold(s, Bytes::from_static(b"c")),
            EditOutcome::Rejected { reason: RejectReason::QueueFull(2), .. }
        ));

        let drained = buffer.drain();
        assert_eq!(drained.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(drained[0].payload, Bytes::from_static(b"a"));
        assert!(buffer.is_empty());
    }
}
