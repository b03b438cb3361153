//! Session registry keyed by document id
//!
//! Each open document gets its own [`CollabSession`]; status and history
//! slots are never shared between documents.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::hydration::{DocumentId, MetadataSink, SessionMetadata, SyncAction};
use crate::session::CollabSession;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Holds actions raised while the map entry is locked
#[derive(Default)]
struct DeferredSink(Mutex<Vec<SyncAction>>);

impl MetadataSink for DeferredSink {
    fn dispatch(&self, action: SyncAction) {
        self.0.lock().push(action);
    }
}

/// Open sessions by document
#[derive(Debug, Default)]
pub struct SessionRegistry {
    config: SessionConfig,
    sessions: DashMap<DocumentId, Arc<CollabSession>>,
}

impl SessionRegistry {
    /// Empty registry; new sessions use `config`
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    /// Open (or return the already open) session for `metadata.document_id`.
    ///
    /// Concurrent opens of one document hydrate it once, and `sink` sees a
    /// single action, dispatched after the session is visible in the map.
    pub fn open(
        &self,
        metadata: SessionMetadata,
        sink: &dyn MetadataSink,
    ) -> Result<Arc<CollabSession>, SessionError> {
        if metadata.document_id.is_empty() {
            return Err(SessionError::EmptyDocumentId);
        }
        let document_id = metadata.document_id.clone();
        if let Some(existing) = self.get(&document_id) {
            return Ok(existing);
        }

        let deferred = DeferredSink::default();
        let session = match self.sessions.entry(document_id.clone()) {
            Entry::Occupied(entry) => return Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let session = Arc::new(CollabSession::new(self.config.clone()));
                session.hydrate(metadata, &deferred)?;
                Arc::clone(entry.insert(session).value())
            }
        };

        // The shard lock is released here, so the sink may call back in.
        for action in deferred.0.into_inner() {
            sink.dispatch(action);
        }
        tracing::info!(document = %document_id, "session opened");
        Ok(session)
    }

    /// Session for `document_id`, if open
    #[must_use]
    pub fn get(&self, document_id: &DocumentId) -> Option<Arc<CollabSession>> {
        self.sessions.get(document_id).map(|s| Arc::clone(s.value()))
    }

    /// Unmount and remove the session for `document_id`
    pub fn close(&self, document_id: &DocumentId) -> Option<Arc<CollabSession>> {
        let (_, session) = self.sessions.remove(document_id)?;
        session.unmount();
        tracing::info!(document = %document_id, "session closed");
        Some(session)
    }

    /// Number of open sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// No open sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of every open document, sorted
    #[must_use]
    pub fn document_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
