//! Per-session record of applied status changes
//!
//! Bounded; once full the oldest entry is evicted. [`Journal::verify_sequence`]
//! checks that what is retained is gap-free and chained.

use crate::status::{ConnectionStatus, StatusChange};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The applied change
    pub change: StatusChange,
    /// When the session observed it
    pub recorded_at: DateTime<Utc>,
}

/// Gap or discontinuity found by [`Journal::verify_sequence`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JournalError {
    /// A sequence number was skipped or repeated
    #[error("expected seq {expected}, found {found}")]
    SequenceGap {
        /// Next number in sequence
        expected: u64,
        /// Number actually recorded
        found: u64,
    },
    /// A change does not start where the previous one ended
    #[error("entry {seq} starts from {from} but previous entry ended in {previous}")]
    Discontinuous {
        /// Sequence number of the offending change
        seq: u64,
        /// Where it claims to start
        from: ConnectionStatus,
        /// Where the previous change ended
        previous: ConnectionStatus,
    },
}

/// Bounded, append-only record of a session's status changes
#[derive(Debug)]
pub struct Journal {
    capacity: usize,
    inner: Mutex<VecDeque<JournalEntry>>,
}

impl Journal {
    /// Empty journal holding at most `capacity` entries (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Append `change`, evicting the oldest entry when full
    pub fn record(&self, change: StatusChange) {
        let mut guard = self.inner.lock();
        if guard.len() == self.capacity {
            guard.pop_front();
        }
        guard.push_back(JournalEntry {
            change,
            recorded_at: Utc::now(),
        });
    }

    /// Retained entries, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.inner.lock().iter().cloned().collect()
    }

    /// Retained changes without timestamps
    #[must_use]
    pub fn changes(&self) -> Vec<StatusChange> {
        self.inner.lock().iter().map(|e| e.change).collect()
    }

    /// Retained entry count
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Nothing recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Sequence numbers are contiguous and each change starts where the
    /// previous one ended. The first retained entry may be past seq 1 once
    /// older entries were evicted.
    pub fn verify_sequence(&self) -> Result<(), JournalError> {
        let guard = self.inner.lock();
        let mut prev: Option<StatusChange> = None;
        for entry in guard.iter() {
            let change = entry.change;
            match prev {
                None if guard.len() < self.capacity && change.seq != 1 => {
                    return Err(JournalError::SequenceGap {
                        expected: 1,
                        found: change.seq,
                    });
                }
                Some(p) if change.seq != p.seq + 1 => {
                    return Err(JournalError::SequenceGap {
                        expected: p.seq + 1,
                        found: change.seq,
                    });
                }
                Some(p) if change.from != p.to => {
                    return Err(JournalError::Discontinuous {
                        seq: change.seq,
                        from: change.from,
                        previous: p.to,
                    });
                }
                _ => {}
            }
            prev = Some(change);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionStatus::*;

    fn change(seq: u64, from: ConnectionStatus, to: ConnectionStatus) -> StatusChange {
        StatusChange { seq, from, to }
    }

    #[test]
    fn contiguous_journal_verifies() {
        let journal = Journal::new(8);
        journal.record(change(1, Connecting, Connected));
        journal.record(change(2, Connected, Syncing));
        assert!(journal.verify_sequence().is_ok());
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn gap_is_reported() {
        let journal = Journal::new(8);
        journal.record(change(1, Connecting, Connected));
        journal.record(change(3, Syncing, Synced));
        assert_eq!(
            journal.verify_sequence(),
            Err(JournalError::SequenceGap { expected: 2, found: 3 })
        );
    }

    #[test]
    fn discontinuity_is_reported() {
        let journal = Journal::new(8);
        journal.record(change(1, Connecting, Connected));
        journal.record(change(2, Syncing, Synced));
        assert!(matches!(
            journal.verify_sequence(),
            Err(JournalError::Discontinuous { seq: 2, .. })
        ));
    }

    #[test]
    fn eviction_keeps_newest() {
        let journal = Journal::new(2);
        journal.record(change(1, Connecting, Connected));
        journal.record(change(2, Connected, Syncing));
        journal.record(change(3, Syncing, Synced));
        assert_eq!(journal.changes().iter().map(|c| c.seq).collect::<Vec<_>>(), vec![2, 3]);
        assert!(journal.verify_sequence().is_ok());
    }
}
