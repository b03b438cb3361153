use crate::error::StatusError;
use crate::status::ConnectionStatus;

/// Validates a status transition.
///
/// Illegal transitions return an error so callers can keep the current
/// status. The `strict-debug` feature turns them into a panic instead.
pub fn validate_transition(
    from: ConnectionStatus,
    to: ConnectionStatus,
) -> Result<(), StatusError> {
    if allowed(from, to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal status transition attempted: {from} -> {to}");

        #[cfg(not(feature = "strict-debug"))]
        Err(StatusError::IllegalTransition { from, to })
    }
}

/// Targets reachable from `from` in one step.
#[must_use]
pub fn allowed_transitions(from: ConnectionStatus) -> Vec<ConnectionStatus> {
    use ConnectionStatus::*;
    match from {
        Connecting => vec![Connected, Overloaded, Disconnected],
        Connected => vec![Syncing, Overloaded, Disconnected],
        Syncing => vec![Synced, Overloaded, Disconnected],
        Synced => vec![Reconnecting, Publishing, Overloaded, Disconnected],
        Reconnecting => vec![Synced, Overloaded, Disconnected],
        Publishing => vec![Synced, Overloaded, Disconnected],
        Overloaded => vec![Connected, Syncing, Synced, Reconnecting, Disconnected],
        Disconnected => vec![Connecting],
    }
}

/// Every `(from, to)` pair the table allows
#[must_use]
pub fn transition_table() -> Vec<(ConnectionStatus, ConnectionStatus)> {
    ConnectionStatus::ALL
        .into_iter()
        .flat_map(|from| allowed_transitions(from).into_iter().map(move |to| (from, to)))
        .collect()
}

fn allowed(from: ConnectionStatus, to: ConnectionStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionStatus::*;

    #[test]
    fn happy_path_is_allowed() {
        let path = [Connecting, Connected, Syncing, Synced, Reconnecting, Synced, Disconnected];
        for pair in path.windows(2) {
            assert!(validate_transition(pair[0], pair[1]).is_ok(), "{pair:?}");
        }
    }

    #[test]
    fn disconnected_only_leaves_to_connecting() {
        assert_eq!(allowed_transitions(Disconnected), vec![Connecting]);
        assert!(validate_transition(Disconnected, Reconnecting).is_err());
        assert!(validate_transition(Disconnected, Synced).is_err());
    }

    #[test]
    fn every_live_state_can_overload_and_disconnect() {
        for from in ConnectionStatus::ALL {
            if from != Disconnected {
                assert!(allowed(from, Disconnected), "{from} -> disconnected");
            }
            if from != Disconnected && from != Overloaded {
                assert!(allowed(from, Overloaded), "{from} -> overloaded");
            }
        }
    }

    #[test]
    fn no_self_transitions_in_table() {
        for (from, to) in transition_table() {
            assert_ne!(from, to);
        }
    }

    #[test]
    fn reconnecting_is_not_reachable_before_sync() {
        assert!(validate_transition(Connecting, Reconnecting).is_err());
        assert!(validate_transition(Connected, Reconnecting).is_err());
    }
}
