//! Editability gate
//!
//! Maps a connection status to "does the editing surface accept input".
//! Pure and total over [`ConnectionStatus`]; anything that is not a known
//! status is treated as non-editable.

use crate::hydration::Role;
use crate::status::ConnectionStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether edits are accepted in `status` under the default policy.
///
/// Only `disconnected` blocks edits. `overloaded` still accepts them and
/// the transport queues them upstream.
#[must_use]
pub fn is_editable(status: ConnectionStatus) -> bool {
    EditabilityPolicy::default().is_editable(status)
}

/// Gate on a raw status string; unknown values are non-editable
#[must_use]
pub fn is_editable_str(status: &str) -> bool {
    status
        .parse::<ConnectionStatus>()
        .map(is_editable)
        .unwrap_or(false)
}

/// Tunable part of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditabilityPolicy {
    /// Accept edits while the transport reports backpressure
    pub overloaded_editable: bool,
}

impl Default for EditabilityPolicy {
    fn default() -> Self {
        Self {
            overloaded_editable: true,
        }
    }
}

impl EditabilityPolicy {
    /// Whether edits are accepted in `status`
    #[must_use]
    pub fn is_editable(self, status: ConnectionStatus) -> bool {
        match status {
            ConnectionStatus::Connecting
            | ConnectionStatus::Connected
            | ConnectionStatus::Syncing
            | ConnectionStatus::Reconnecting
            | ConnectionStatus::Synced
            | ConnectionStatus::Publishing => true,
            ConnectionStatus::Overloaded => self.overloaded_editable,
            ConnectionStatus::Disconnected => false,
        }
    }

    /// Editability for a participant with `role`; viewers never edit
    #[must_use]
    pub fn evaluate(self, status: ConnectionStatus, role: Role) -> Editability {
        let editable = role.can_edit() && self.is_editable(status);
        Editability {
            status,
            editable,
            indicator: StatusIndicator::for_status(status, role, editable),
        }
    }

    /// Statuses that accept edits under this policy
    #[must_use]
    pub fn editable_set(self) -> BTreeSet<ConnectionStatus> {
        ConnectionStatus::ALL
            .into_iter()
            .filter(|s| self.is_editable(*s))
            .collect()
    }
}

/// Gate result for the editing surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Editability {
    /// Status this was computed from
    pub status: ConnectionStatus,
    /// Edits accepted
    pub editable: bool,
    /// What the UI shows next to the editor
    pub indicator: StatusIndicator,
}

impl Editability {
    /// Gate of a session that has been unmounted: input refused regardless
    /// of `status`
    #[must_use]
    pub fn closed(status: ConnectionStatus) -> Self {
        Self {
            status,
            editable: false,
            indicator: StatusIndicator {
                label: "Closed".to_string(),
                blocked: true,
            },
        }
    }
}

impl Default for Editability {
    fn default() -> Self {
        EditabilityPolicy::default().evaluate(ConnectionStatus::Connecting, Role::Editor)
    }
}

/// Visible status label; `blocked` is set whenever input is refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusIndicator {
    /// Short label
    pub label: String,
    /// Input is refused
    pub blocked: bool,
}

impl StatusIndicator {
    fn for_status(status: ConnectionStatus, role: Role, editable: bool) -> Self {
        let label = match (role, status) {
            (Role::Viewer, _) => "Read only",
            (_, ConnectionStatus::Connecting) => "Connecting",
            (_, ConnectionStatus::Connected | ConnectionStatus::Syncing) => "Syncing",
            (_, ConnectionStatus::Synced) => "Saved",
            (_, ConnectionStatus::Reconnecting) => "Reconnecting",
            (_, ConnectionStatus::Publishing) => "Publishing",
            (_, ConnectionStatus::Overloaded) => "Busy",
            (_, ConnectionStatus::Disconnected) => "Offline",
        };
        Self {
            label: label.to_string(),
            blocked: !editable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionStatus::*;

    #[test]
    fn truth_table() {
        let table = [
            (Connecting, true),
            (Connected, true),
            (Syncing, true),
            (Overloaded, true),
            (Disconnected, false),
            (Reconnecting, true),
            (Synced, true),
            (Publishing, true),
        ];
        assert_eq!(table.len(), ConnectionStatus::ALL.len());
        for (status, expected) in table {
            assert_eq!(is_editable(status), expected, "{status}");
        }
    }

    #[test]
    fn unknown_strings_fail_closed() {
        assert!(!is_editable_str("offline"));
        assert!(!is_editable_str(""));
        assert!(!is_editable_str("SYNCED"));
        assert!(is_editable_str("synced"));
        assert!(!is_editable_str("disconnected"));
    }

    #[test]
    fn overloaded_can_be_blocked_by_policy() {
        let policy = EditabilityPolicy {
            overloaded_editable: false,
        };
        assert!(!policy.is_editable(Overloaded));
        assert!(!policy.editable_set().contains(&Overloaded));
        assert_eq!(policy.editable_set().len(), 6);
    }

    #[test]
    fn viewers_are_blocked_everywhere() {
        for status in ConnectionStatus::ALL {
            let e = EditabilityPolicy::default().evaluate(status, Role::Viewer);
            assert!(!e.editable);
            assert!(e.indicator.blocked);
            assert_eq!(e.indicator.label, "Read only");
        }
    }

    #[test]
    fn disconnected_shows_blocked_indicator() {
        let e = EditabilityPolicy::default().evaluate(Disconnected, Role::Editor);
        assert!(!e.editable);
        assert_eq!(
            e.indicator,
            StatusIndicator {
                label: "Offline".to_string(),
                blocked: true
            }
        );
    }
}
