//! Seam to the external sync transport
//!
//! The transport owns connectivity and reports it as [`ConnectionStatus`]
//! values. [`SyncTransport`] is the narrow read-only view a session needs;
//! [`TransportEvent`] is the vocabulary for transports that report events
//! rather than statuses.

use crate::session::CollabSession;
use crate::signal::Subscription;
use crate::status::ConnectionStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Observer of transport status reports
pub type StatusCallback = Box<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Read-only view of a sync transport
pub trait SyncTransport: Send + Sync {
    /// Status the transport currently reports
    fn current_status(&self) -> ConnectionStatus;

    /// Observe every status the transport reports from now on
    fn subscribe(&self, callback: StatusCallback) -> Subscription;
}

/// Connectivity event as reported by an event-style transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportEvent {
    /// Handshake completed
    HandshakeSucceeded,
    /// State vector exchange started
    SyncStarted,
    /// Local replica caught up
    CaughtUp,
    /// Transient loss on an established session
    ConnectionBlip,
    /// Transient loss recovered
    ConnectionRestored,
    /// Publish started
    PublishStarted,
    /// Publish finished
    PublishFinished,
    /// Too many pending operations
    Backpressure,
    /// Backpressure cleared; the transport names the status it resumed in
    BackpressureRelieved(ConnectionStatus),
    /// Irrecoverable failure
    Failed,
    /// Explicit retry after a failure
    Retry,
}

impl TransportEvent {
    /// Status this event moves the session to
    #[must_use]
    pub fn target(self) -> ConnectionStatus {
        match self {
            TransportEvent::HandshakeSucceeded => ConnectionStatus::Connected,
            TransportEvent::SyncStarted => ConnectionStatus::Syncing,
            TransportEvent::CaughtUp
            | TransportEvent::ConnectionRestored
            | TransportEvent::PublishFinished => ConnectionStatus::Synced,
            TransportEvent::ConnectionBlip => ConnectionStatus::Reconnecting,
            TransportEvent::PublishStarted => ConnectionStatus::Publishing,
            TransportEvent::Backpressure => ConnectionStatus::Overloaded,
            TransportEvent::BackpressureRelieved(status) => status,
            TransportEvent::Failed => ConnectionStatus::Disconnected,
            TransportEvent::Retry => ConnectionStatus::Connecting,
        }
    }
}

/// Apply events from `events` to `session` in arrival order until the
/// channel closes. Returns the number of events that changed the status.
///
/// Rejected events are logged and skipped; the loop keeps going.
pub async fn drive(session: Arc<CollabSession>, mut events: mpsc::Receiver<TransportEvent>) -> u64 {
    let mut applied = 0;
    while let Some(event) = events.recv().await {
        let result = match event {
            TransportEvent::Failed => Ok(session.fail()),
            TransportEvent::Retry => session.retry().map(Some),
            other => session.apply_status(other.target()),
        };
        match result {
            Ok(Some(_)) => applied += 1,
            Ok(None) => {}
            Err(err) => tracing::warn!(?event, error = %err, "transport event rejected"),
        }
    }
    tracing::debug!(applied, "transport event stream closed");
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_and_retry_targets() {
        assert_eq!(TransportEvent::Failed.target(), ConnectionStatus::Disconnected);
        assert_eq!(TransportEvent::Retry.target(), ConnectionStatus::Connecting);
        assert_eq!(
            TransportEvent::BackpressureRelieved(ConnectionStatus::Syncing).target(),
            ConnectionStatus::Syncing
        );
    }

    #[test]
    fn events_serialize_snake_case() {
        let json = serde_json::to_string(&TransportEvent::HandshakeSucceeded).unwrap();
        assert_eq!(json, "\"handshake_succeeded\"");
    }
}
