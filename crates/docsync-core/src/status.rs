//! Connection status of a document session
//!
//! The status is reported by the sync transport. This module only names
//! the states; [`crate::state_machine`] owns the transition table and
//! [`crate::model::StatusModel`] holds the live value.

use crate::error::StatusParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle phase of a document's real-time connection
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Handshake in flight. Initial state and the state after a retry.
    #[default]
    Connecting,
    /// Handshake succeeded
    Connected,
    /// Initial state vector exchange in progress
    Syncing,
    /// Transport reports too many pending operations
    Overloaded,
    /// Hard disconnect; only an explicit retry leaves this state
    Disconnected,
    /// Transient blip on an established session
    Reconnecting,
    /// Local replica caught up
    Synced,
    /// Document is being published
    Publishing,
}

impl ConnectionStatus {
    /// Every status, in declaration order
    pub const ALL: [ConnectionStatus; 8] = [
        ConnectionStatus::Connecting,
        ConnectionStatus::Connected,
        ConnectionStatus::Syncing,
        ConnectionStatus::Overloaded,
        ConnectionStatus::Disconnected,
        ConnectionStatus::Reconnecting,
        ConnectionStatus::Synced,
        ConnectionStatus::Publishing,
    ];

    /// Lowercase name, matching the serialized form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Syncing => "syncing",
            ConnectionStatus::Overloaded => "overloaded",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Synced => "synced",
            ConnectionStatus::Publishing => "publishing",
        }
    }

    /// True once the handshake has completed at least once for this connection
    #[must_use]
    pub fn is_established(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connected
                | ConnectionStatus::Syncing
                | ConnectionStatus::Synced
                | ConnectionStatus::Reconnecting
                | ConnectionStatus::Publishing
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConnectionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusParseError(s.to_string()))
    }
}

/// One applied status change, numbered within its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Sequence number, starting at 1 for the first change of a session.
    /// 0 marks the reset to `connecting` when another document is hydrated.
    pub seq: u64,
    /// Previous status
    pub from: ConnectionStatus,
    /// New status
    pub to: ConnectionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_display_form() {
        for status in ConnectionStatus::ALL {
            assert_eq!(status.to_string().parse::<ConnectionStatus>(), Ok(status));
        }
    }

    #[test]
    fn rejects_unknown_and_differently_cased_names() {
        assert!("offline".parse::<ConnectionStatus>().is_err());
        assert!("Connected".parse::<ConnectionStatus>().is_err());
        assert!("".parse::<ConnectionStatus>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionStatus::Reconnecting).unwrap();
        assert_eq!(json, "\"reconnecting\"");
        let back: ConnectionStatus = serde_json::from_str("\"publishing\"").unwrap();
        assert_eq!(back, ConnectionStatus::Publishing);
    }

    #[test]
    fn initial_status_is_connecting() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Connecting);
    }
}
