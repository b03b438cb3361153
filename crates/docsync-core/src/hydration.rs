//! Session hydration
//!
//! Seeds a session from externally supplied metadata exactly once per
//! document. Hydrating again with the same document id is a no-op;
//! hydrating with another id starts a new session from scratch.

use crate::error::SessionError;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque document identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an id; empty ids are rejected at hydration
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Underlying string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of one hydrated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Participant role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May edit
    #[default]
    Editor,
    /// Read only
    Viewer,
}

impl Role {
    /// Whether this role may submit edits at all
    #[must_use]
    pub fn can_edit(self) -> bool {
        matches!(self, Role::Editor)
    }
}

/// Initial binding for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    /// Document being edited
    pub document_id: DocumentId,
    /// Participant role
    pub role: Role,
    /// Serialized initial document state, consumed once
    pub snapshot: Option<Bytes>,
}

impl SessionMetadata {
    /// Metadata without a snapshot
    pub fn new(document_id: impl Into<DocumentId>, role: Role) -> Self {
        Self {
            document_id: document_id.into(),
            role,
            snapshot: None,
        }
    }

    /// With initial snapshot
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: impl Into<Bytes>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }
}

/// Dispatched to the metadata store after a (re)hydration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncAction {
    /// Refresh dependent state from the freshly hydrated document
    SyncWithExternalSource {
        /// New session
        session_id: SessionId,
        /// Hydrated document
        document_id: DocumentId,
        /// Participant role
        role: Role,
    },
}

/// Receiver of [`SyncAction`]s, e.g. a metadata panel store
pub trait MetadataSink: Send + Sync {
    /// Accept one action
    fn dispatch(&self, action: SyncAction);
}

/// Result of [`Hydrator::hydrate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationOutcome {
    /// First hydration
    Hydrated(SessionId),
    /// Same document again; nothing changed
    AlreadyHydrated(SessionId),
    /// Another document replaced the previous session
    Replaced {
        /// Session that was dropped
        previous: SessionId,
        /// New session
        session_id: SessionId,
    },
}

impl HydrationOutcome {
    /// Session in force after hydration
    #[must_use]
    pub fn session_id(self) -> SessionId {
        match self {
            HydrationOutcome::Hydrated(id) | HydrationOutcome::AlreadyHydrated(id) => id,
            HydrationOutcome::Replaced { session_id, .. } => session_id,
        }
    }

    /// True when local state was (re)seeded
    #[must_use]
    pub fn is_new_session(self) -> bool {
        !matches!(self, HydrationOutcome::AlreadyHydrated(_))
    }
}

#[derive(Debug)]
struct Hydrated {
    session_id: SessionId,
    document_id: DocumentId,
    role: Role,
    snapshot: Option<Bytes>,
}

/// Holds the hydrated binding of one session
#[derive(Debug, Default)]
pub struct Hydrator {
    state: Mutex<Option<Hydrated>>,
}

impl Hydrator {
    /// Not yet hydrated
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from `metadata`, dispatching to `sink` when a new session starts
    pub fn hydrate(
        &self,
        metadata: SessionMetadata,
        sink: &dyn MetadataSink,
    ) -> Result<HydrationOutcome, SessionError> {
        if metadata.document_id.is_empty() {
            return Err(SessionError::EmptyDocumentId);
        }

        let mut guard = self.state.lock();
        let previous = match guard.as_ref() {
            Some(current) if current.document_id == metadata.document_id => {
                return Ok(HydrationOutcome::AlreadyHydrated(current.session_id));
            }
            Some(current) => Some(current.session_id),
            None => None,
        };

        let session_id = SessionId::new();
        let action = SyncAction::SyncWithExternalSource {
            session_id,
            document_id: metadata.document_id.clone(),
            role: metadata.role,
        };
        // Full replacement: nothing from the previous document survives.
        *guard = Some(Hydrated {
            session_id,
            document_id: metadata.document_id,
            role: metadata.role,
            snapshot: metadata.snapshot,
        });
        drop(guard);

        let outcome = match previous {
            Some(previous) => {
                tracing::info!(%previous, %session_id, "session replaced by another document");
                HydrationOutcome::Replaced {
                    previous,
                    session_id,
                }
            }
            None => {
                tracing::info!(%session_id, "session hydrated");
                HydrationOutcome::Hydrated(session_id)
            }
        };
        sink.dispatch(action);
        Ok(outcome)
    }

    /// Initial snapshot; returns it once, then `None`
    pub fn take_snapshot(&self) -> Option<Bytes> {
        self.state.lock().as_mut().and_then(|h| h.snapshot.take())
    }

    /// Whether the snapshot is still waiting to be consumed
    #[must_use]
    pub fn has_pending_snapshot(&self) -> bool {
        self.state
            .lock()
            .as_ref()
            .is_some_and(|h| h.snapshot.is_some())
    }

    /// Hydrated document id
    #[must_use]
    pub fn document_id(&self) -> Option<DocumentId> {
        self.state.lock().as_ref().map(|h| h.document_id.clone())
    }

    /// Hydrated role
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.state.lock().as_ref().map(|h| h.role)
    }

    /// Current session id
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.state.lock().as_ref().map(|h| h.session_id)
    }

    /// Whether any document has been hydrated
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Forget the hydrated document
    pub fn clear(&self) {
        *self.state.lock() = None;
    }
}
