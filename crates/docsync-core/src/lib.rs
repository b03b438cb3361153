//! docsync core
//!
//! Local coordination for a collaborative document session: the
//! connection status reported by the sync transport, whether the editing
//! surface accepts input, one-time hydration from external metadata, and
//! the undo/redo capabilities of the CRDT layer's undo manager.
//!
//! # Core Concepts
//!
//! - [`ConnectionStatus`]: closed set of transport lifecycle states
//! - [`StatusModel`]: current status, transition table, ordered observers
//! - [`is_editable`]: the editability gate
//! - [`Hydrator`]: binds a document id, role and snapshot once per document
//! - [`HistoryAdapter`]: mirrors `can_undo` / `can_redo`
//! - [`CollabSession`]: the above wired together for one document
//! - [`SessionRegistry`]: one session per open document

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod edits;
pub mod error;
pub mod gate;
pub mod history;
pub mod hydration;
pub mod journal;
pub mod model;
pub mod registry;
pub mod session;
pub mod signal;
pub mod state_machine;
pub mod status;
pub mod transport;

pub use config::{BlockedEditPolicy, SessionConfig, TransitionPolicy};
pub use edits::{EditBuffer, EditOutcome, PendingEdit, RejectReason};
pub use error::{ConfigError, SessionError, StatusError, StatusParseError};
pub use gate::{is_editable, is_editable_str, Editability, EditabilityPolicy, StatusIndicator};
pub use history::{HistoryAdapter, HistoryState, UndoManager};
pub use hydration::{
    DocumentId, HydrationOutcome, Hydrator, MetadataSink, Role, SessionId, SessionMetadata,
    SyncAction,
};
pub use journal::{Journal, JournalEntry, JournalError};
pub use model::{StatusModel, StatusStream};
pub use registry::SessionRegistry;
pub use session::CollabSession;
pub use signal::{Signal, Subscription};
pub use status::{ConnectionStatus, StatusChange};
pub use transport::{drive, StatusCallback, SyncTransport, TransportEvent};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
