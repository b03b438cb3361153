//! One collaborative document session
//!
//! Wires the status model, editability gate, hydration, history adapter,
//! edit buffer and journal together. All state lives in the session
//! value; nothing is shared between sessions.
//!
//! # Example
//!
//! ```rust,ignore
//! use docsync_core::{CollabSession, ConnectionStatus, Role, SessionConfig, SessionMetadata};
//!
//! let session = CollabSession::new(SessionConfig::default());
//! session.hydrate(SessionMetadata::new("doc-1", Role::Editor), &sink)?;
//! session.apply_status(ConnectionStatus::Connected)?;
//! assert!(session.is_editable());
//! ```

use crate::config::SessionConfig;
use crate::edits::{EditBuffer, EditOutcome, PendingEdit, RejectReason};
use crate::error::SessionError;
use crate::gate::{Editability, EditabilityPolicy};
use crate::history::{HistoryAdapter, HistoryState, UndoManager};
use crate::hydration::{DocumentId, HydrationOutcome, Hydrator, MetadataSink, Role, SessionId, SessionMetadata};
use crate::journal::Journal;
use crate::model::{StatusModel, StatusStream};
use crate::signal::{Signal, Subscription};
use crate::status::{ConnectionStatus, StatusChange};
use crate::transport::SyncTransport;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// State recomputed from every status change
#[derive(Debug)]
struct Derived {
    policy: EditabilityPolicy,
    role: RwLock<Role>,
    editability: Signal<Editability>,
    journal: Journal,
    unmounted: AtomicBool,
}

impl Derived {
    fn recompute(&self, status: ConnectionStatus) -> Editability {
        let editability = if self.unmounted.load(Ordering::Acquire) {
            Editability::closed(status)
        } else {
            self.policy.evaluate(status, *self.role.read())
        };
        self.editability.set(editability.clone());
        editability
    }
}

/// Coordination state for one collaborative document
#[derive(Debug)]
pub struct CollabSession {
    config: SessionConfig,
    status: StatusModel,
    hydrator: Hydrator,
    history: HistoryAdapter,
    edits: EditBuffer,
    derived: Arc<Derived>,
    status_link: Mutex<Option<Subscription>>,
    transport_links: Mutex<Vec<Subscription>>,
}

impl CollabSession {
    /// New, unhydrated session in `connecting`
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let policy = config.editability_policy();
        let derived = Arc::new(Derived {
            policy,
            role: RwLock::new(Role::Editor),
            editability: Signal::new(policy.evaluate(ConnectionStatus::Connecting, Role::Editor)),
            journal: Journal::new(config.journal_capacity),
            unmounted: AtomicBool::new(false),
        });
        let status = StatusModel::with_policy(config.transition_policy);

        // Registered first so journal and editability are current before
        // any outside observer of the status runs.
        let weak: Weak<Derived> = Arc::downgrade(&derived);
        let link = status.subscribe(move |change| {
            if let Some(derived) = weak.upgrade() {
                // seq 0 is the reset for a new document, not a transport change.
                if change.seq > 0 {
                    derived.journal.record(*change);
                }
                derived.recompute(change.to);
            }
        });

        Self {
            edits: EditBuffer::new(config.blocked_edits),
            config,
            status,
            hydrator: Hydrator::new(),
            history: HistoryAdapter::new(),
            derived,
            status_link: Mutex::new(Some(link)),
            transport_links: Mutex::new(Vec::new()),
        }
    }

    /// Configuration in force
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Bind to `metadata`. A different document than the current one
    /// resets status, history, pending edits, journal and transport links.
    ///
    /// Status observers stay attached across a replacement and see the
    /// reset to `connecting` as a change numbered 0.
    pub fn hydrate(
        &self,
        metadata: SessionMetadata,
        sink: &dyn MetadataSink,
    ) -> Result<HydrationOutcome, SessionError> {
        self.ensure_mounted()?;
        let role = metadata.role;
        let outcome = self.hydrator.hydrate(metadata, sink)?;
        if let HydrationOutcome::AlreadyHydrated(_) = outcome {
            return Ok(outcome);
        }

        *self.derived.role.write() = role;
        if let HydrationOutcome::Replaced { .. } = outcome {
            self.transport_links.lock().clear();
            self.derived.journal.clear();
            self.edits.clear();
            self.history.detach();
            if let Some(change) = self.status.reset() {
                tracing::debug!(from = %change.from, "status reset for new document");
            }
        }
        self.derived.recompute(self.status.current());
        Ok(outcome)
    }

    /// Hydrated document
    #[must_use]
    pub fn document_id(&self) -> Option<DocumentId> {
        self.hydrator.document_id()
    }

    /// Current session id, once hydrated
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.hydrator.session_id()
    }

    /// Participant role (editor until hydrated)
    #[must_use]
    pub fn role(&self) -> Role {
        *self.derived.role.read()
    }

    /// Initial snapshot, handed out once
    pub fn take_snapshot(&self) -> Option<Bytes> {
        self.hydrator.take_snapshot()
    }

    /// Current connection status
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.current()
    }

    /// Apply a status reported by the transport
    pub fn apply_status(&self, to: ConnectionStatus) -> Result<Option<StatusChange>, SessionError> {
        self.ensure_mounted()?;
        self.status.apply(to)
    }

    /// Terminal transport failure; ignored once unmounted
    pub fn fail(&self) -> Option<StatusChange> {
        if self.is_unmounted() {
            return None;
        }
        self.status.fail()
    }

    /// Explicit retry after a failure
    pub fn retry(&self) -> Result<StatusChange, SessionError> {
        self.ensure_mounted()?;
        self.status.retry()
    }

    /// Observe status changes
    #[must_use = "dropping the subscription detaches the observer"]
    pub fn subscribe_status(
        &self,
        observer: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.status.subscribe(observer)
    }

    /// Async stream of status changes
    #[must_use]
    pub fn watch_status(&self) -> StatusStream {
        self.status.watch()
    }

    /// Mirror the transport's status, now and on every report.
    ///
    /// The current status is adopted as is; later reports go through the
    /// transition policy.
    pub fn bind_transport(self: &Arc<Self>, transport: &dyn SyncTransport) {
        if self.is_unmounted() {
            tracing::debug!("transport not bound to unmounted session");
            return;
        }
        if let Some(change) = self.status.force(transport.current_status()) {
            tracing::debug!(to = %change.to, "adopted transport status");
        }

        let weak = Arc::downgrade(self);
        let link = transport.subscribe(Box::new(move |status: ConnectionStatus| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            if let Err(err) = session.apply_status(status) {
                tracing::warn!(%status, error = %err, "transport status rejected");
            }
        }));
        self.transport_links.lock().push(link);
    }

    /// Current gate result
    #[must_use]
    pub fn editability(&self) -> Editability {
        self.derived.editability.get()
    }

    /// Whether the editing surface accepts input right now
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.derived.editability.with(|e| e.editable)
    }

    /// Observe gate changes
    #[must_use = "dropping the subscription detaches the observer"]
    pub fn subscribe_editability(
        &self,
        observer: impl Fn(&Editability) + Send + Sync + 'static,
    ) -> Subscription {
        self.derived.editability.subscribe(observer)
    }

    /// Submit an edit from the editing surface
    pub fn submit_edit(&self, payload: impl Into<Bytes>) -> Result<EditOutcome, SessionError> {
        self.ensure_mounted()?;
        if !self.hydrator.is_hydrated() {
            return Err(SessionError::NotHydrated);
        }
        let payload = payload.into();
        let editability = self.editability();
        if editability.editable {
            return Ok(EditOutcome::Accepted(payload));
        }
        if !self.role().can_edit() {
            return Ok(EditOutcome::Rejected {
                reason: RejectReason::ReadOnlyRole,
                payload,
            });
        }
        Ok(self.edits.hold(editability.status, payload))
    }

    /// Release held edits once the session is editable; empty while blocked
    pub fn drain_pending(&self) -> Vec<PendingEdit> {
        if self.is_editable() {
            self.edits.drain()
        } else {
            Vec::new()
        }
    }

    /// Number of held edits
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.edits.len()
    }

    /// History adapter
    #[must_use]
    pub fn history(&self) -> &HistoryAdapter {
        &self.history
    }

    /// Bind the CRDT layer's undo manager
    pub fn attach_undo_manager(&self, manager: Arc<dyn UndoManager>) {
        self.history.attach(manager);
    }

    /// Mirrored undo/redo capability
    #[must_use]
    pub fn history_state(&self) -> HistoryState {
        self.history.refresh()
    }

    /// Status changes recorded for this document
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.derived.journal
    }

    /// Detach every observer this session holds and close the gate.
    ///
    /// Afterwards status changes, retries, hydration and edits are refused
    /// with [`SessionError::Unmounted`].
    pub fn unmount(&self) {
        self.derived.unmounted.store(true, Ordering::Release);
        self.transport_links.lock().clear();
        self.status_link.lock().take();
        self.history.detach();
        self.derived.recompute(self.status.current());
        tracing::debug!(document = ?self.hydrator.document_id(), "session unmounted");
    }

    /// Whether [`CollabSession::unmount`] has run
    #[must_use]
    pub fn is_unmounted(&self) -> bool {
        self.derived.unmounted.load(Ordering::Acquire)
    }

    fn ensure_mounted(&self) -> Result<(), SessionError> {
        if self.is_unmounted() {
            Err(SessionError::Unmounted)
        } else {
            Ok(())
        }
    }
}

impl Default for CollabSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
