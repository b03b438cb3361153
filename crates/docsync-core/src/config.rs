//! Session configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is a
//! valid configuration.

use crate::error::ConfigError;
use crate::gate::EditabilityPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the status model treats transitions outside the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Reject and keep the current status
    #[default]
    Strict,
    /// Accept whatever the transport reports, with a warning
    LastWriteWins,
}

/// What happens to an edit submitted while the session is not editable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedEditPolicy {
    /// Hand the edit back to the caller
    Reject,
    /// Hold up to `capacity` edits until the session is editable again
    Queue {
        /// Maximum number of held edits
        capacity: usize,
    },
}

impl Default for BlockedEditPolicy {
    fn default() -> Self {
        BlockedEditPolicy::Queue { capacity: 256 }
    }
}

/// Configuration for a [`crate::session::CollabSession`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Transition enforcement
    pub transition_policy: TransitionPolicy,
    /// Accept edits while the transport reports backpressure
    pub overloaded_editable: bool,
    /// Handling of edits submitted while blocked
    pub blocked_edits: BlockedEditPolicy,
    /// Maximum journal entries kept per session
    pub journal_capacity: usize,
    /// Default `tracing` filter for binaries
    pub log_filter: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::Strict,
            overloaded_editable: true,
            blocked_edits: BlockedEditPolicy::default(),
            journal_capacity: 1024,
            log_filter: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With transition policy
    #[inline]
    #[must_use]
    pub fn with_transition_policy(mut self, policy: TransitionPolicy) -> Self {
        self.transition_policy = policy;
        self
    }

    /// With overloaded editability
    #[inline]
    #[must_use]
    pub fn with_overloaded_editable(mut self, editable: bool) -> Self {
        self.overloaded_editable = editable;
        self
    }

    /// With blocked edit handling
    #[inline]
    #[must_use]
    pub fn with_blocked_edits(mut self, policy: BlockedEditPolicy) -> Self {
        self.blocked_edits = policy;
        self
    }

    /// With journal capacity
    #[inline]
    #[must_use]
    pub fn with_journal_capacity(mut self, capacity: usize) -> Self {
        self.journal_capacity = capacity;
        self
    }

    /// Editability policy derived from this config
    #[must_use]
    pub fn editability_policy(&self) -> EditabilityPolicy {
        EditabilityPolicy {
            overloaded_editable: self.overloaded_editable,
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.journal_capacity == 0 {
            return Err(ConfigError::Invalid(
                "journal_capacity must be greater than zero".to_string(),
            ));
        }
        if let BlockedEditPolicy::Queue { capacity: 0 } = self.blocked_edits {
            return Err(ConfigError::Invalid(
                "blocked_edits queue capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert!(config.overloaded_editable);
    }

    #[test]
    fn parses_every_field() {
        let text = r#"
            transition_policy = "last_write_wins"
            overloaded_editable = false
            journal_capacity = 16
            log_filter = "docsync_core=debug"

            [blocked_edits.queue]
            capacity = 8
        "#;
        let config = SessionConfig::from_toml_str(text).unwrap();
        assert_eq!(config.transition_policy, TransitionPolicy::LastWriteWins);
        assert!(!config.overloaded_editable);
        assert_eq!(config.blocked_edits, BlockedEditPolicy::Queue { capacity: 8 });
        assert_eq!(config.journal_capacity, 16);
        assert_eq!(config.log_filter, "docsync_core=debug");
    }

    #[test]
    fn parses_reject_policy() {
        let config = SessionConfig::from_toml_str(r#"blocked_edits = "reject""#).unwrap();
        assert_eq!(config.blocked_edits, BlockedEditPolicy::Reject);
    }

    #[test]
    fn zero_capacities_are_invalid() {
        assert!(matches!(
            SessionConfig::from_toml_str("journal_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(SessionConfig::new()
            .with_blocked_edits(BlockedEditPolicy::Queue { capacity: 0 })
            .validate()
            .is_err());
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        assert!(matches!(
            SessionConfig::from_toml_str(r#"transition_policy = "loose""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docsync.toml");
        std::fs::write(&path, "overloaded_editable = false\n").unwrap();
        let config = SessionConfig::load(&path).unwrap();
        assert!(!config.overloaded_editable);
    }
}
