//! Testing utilities for the docsync workspace
//!
//! Fakes for the external collaborators (transport, undo manager,
//! metadata store) and small fixtures.

#![allow(missing_docs)]

use bytes::Bytes;
use docsync_core::{
    CollabSession, ConnectionStatus, MetadataSink, Role, SessionConfig, SessionMetadata, Signal,
    StatusCallback, StatusChange, Subscription, SyncAction, SyncTransport, UndoManager,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Transport whose status is set by the test
pub struct FakeTransport {
    status: Signal<ConnectionStatus>,
}

impl FakeTransport {
    pub fn new(status: ConnectionStatus) -> Self {
        Self {
            status: Signal::new(status),
        }
    }

    /// Report `status` to every subscriber (skipped if unchanged)
    pub fn emit(&self, status: ConnectionStatus) {
        self.status.set(status);
    }

    /// Report `status` even if it is the current one
    pub fn emit_repeat(&self, status: ConnectionStatus) {
        self.status.replace(status);
    }

    pub fn subscriber_count(&self) -> usize {
        self.status.observer_count()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new(ConnectionStatus::Connecting)
    }
}

impl SyncTransport for FakeTransport {
    fn current_status(&self) -> ConnectionStatus {
        self.status.get()
    }

    fn subscribe(&self, callback: StatusCallback) -> Subscription {
        self.status.subscribe(move |status| callback(*status))
    }
}

/// Undo manager with plain counters for stack depths
#[derive(Default)]
pub struct FakeUndoManager {
    stacks: Mutex<(usize, usize)>,
}

impl FakeUndoManager {
    pub fn new(undo: usize, redo: usize) -> Self {
        Self {
            stacks: Mutex::new((undo, redo)),
        }
    }

    /// Simulate a local edit: pushes onto undo, clears redo
    pub fn record_edit(&self) {
        let mut stacks = self.stacks.lock();
        stacks.0 += 1;
        stacks.1 = 0;
    }
}

impl UndoManager for FakeUndoManager {
    fn undo_stack_len(&self) -> usize {
        self.stacks.lock().0
    }

    fn redo_stack_len(&self) -> usize {
        self.stacks.lock().1
    }

    fn undo(&self) -> bool {
        let mut stacks = self.stacks.lock();
        if stacks.0 == 0 {
            return false;
        }
        stacks.0 -= 1;
        stacks.1 += 1;
        true
    }

    fn redo(&self) -> bool {
        let mut stacks = self.stacks.lock();
        if stacks.1 == 0 {
            return false;
        }
        stacks.1 -= 1;
        stacks.0 += 1;
        true
    }
}

/// Metadata store that keeps every dispatched action
#[derive(Default)]
pub struct RecordingSink {
    actions: Mutex<Vec<SyncAction>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<SyncAction> {
        self.actions.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }
}

impl MetadataSink for RecordingSink {
    fn dispatch(&self, action: SyncAction) {
        self.actions.lock().push(action);
    }
}

/// Collects every status change a session reports
pub struct StatusRecorder {
    seen: Arc<Mutex<Vec<StatusChange>>>,
    _subscription: Subscription,
}

impl StatusRecorder {
    pub fn attach(session: &CollabSession) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = session.subscribe_status(move |change| sink.lock().push(*change));
        Self {
            seen,
            _subscription: subscription,
        }
    }

    pub fn changes(&self) -> Vec<StatusChange> {
        self.seen.lock().clone()
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.seen.lock().iter().map(|c| c.to).collect()
    }
}

pub fn editor_metadata(document_id: &str) -> SessionMetadata {
    SessionMetadata::new(document_id, Role::Editor)
}

pub fn viewer_metadata(document_id: &str) -> SessionMetadata {
    SessionMetadata::new(document_id, Role::Viewer)
}

pub fn metadata_with_snapshot(document_id: &str, snapshot: &'static [u8]) -> SessionMetadata {
    editor_metadata(document_id).with_snapshot(Bytes::from_static(snapshot))
}

/// Session hydrated as editor of `document_id` with default config
pub fn hydrated_session(document_id: &str) -> (CollabSession, RecordingSink) {
    hydrated_session_with(document_id, SessionConfig::default())
}

pub fn hydrated_session_with(
    document_id: &str,
    config: SessionConfig,
) -> (CollabSession, RecordingSink) {
    let session = CollabSession::new(config);
    let sink = RecordingSink::new();
    session
        .hydrate(editor_metadata(document_id), &sink)
        .expect("fixture hydration");
    (session, sink)
}

/// Drive `session` along the happy path up to `synced`
pub fn sync_up(session: &CollabSession) {
    for status in [
        ConnectionStatus::Connected,
        ConnectionStatus::Syncing,
        ConnectionStatus::Synced,
    ] {
        session.apply_status(status).expect("happy path transition");
    }
}
