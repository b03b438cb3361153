//! Error types for docsync
//!
//! The gate and history adapter never fail. Errors only come from
//! rejected status transitions, hydration input and configuration.

use crate::status::ConnectionStatus;
use std::path::PathBuf;

/// Main session error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transition is not in the allowed table
    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition {
        /// Status before the attempted change
        from: ConnectionStatus,
        /// Rejected target status
        to: ConnectionStatus,
    },

    /// Retry was requested while the session is not disconnected
    #[error("retry is only valid from disconnected (current: {0})")]
    RetryNotDisconnected(ConnectionStatus),

    /// Hydration was attempted without a document id
    #[error("document id must not be empty")]
    EmptyDocumentId,

    /// Operation requires a hydrated session
    #[error("session has not been hydrated")]
    NotHydrated,

    /// Session was unmounted and no longer accepts input
    #[error("session has been unmounted")]
    Unmounted,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Check if the session can keep going after this error
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Unmounted)
    }
}

impl From<StatusError> for SessionError {
    fn from(value: StatusError) -> Self {
        match value {
            StatusError::IllegalTransition { from, to } => Self::IllegalTransition { from, to },
        }
    }
}

/// State machine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    /// Transition is not in the allowed table
    #[error("{from} -> {to} is not an allowed transition")]
    IllegalTransition {
        /// Source status
        from: ConnectionStatus,
        /// Target status
        to: ConnectionStatus,
    },
}

/// Raised when a string does not name a known status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown connection status: {0:?}")]
pub struct StatusParseError(pub String);

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`crate::config::SessionConfig`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but holds an unusable value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_not_recoverable() {
        let err = SessionError::from(ConfigError::Invalid("journal_capacity".into()));
        assert!(!err.is_recoverable());
        assert!(SessionError::EmptyDocumentId.is_recoverable());
        assert!(!SessionError::Unmounted.is_recoverable());
    }

    #[test]
    fn status_error_converts_with_both_ends() {
        let err: SessionError = StatusError::IllegalTransition {
            from: ConnectionStatus::Disconnected,
            to: ConnectionStatus::Reconnecting,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "illegal status transition: disconnected -> reconnecting"
        );
    }
}
