//! Replay recorded transport output against a fresh session

use crate::simulator::LoggingSink;
use anyhow::{Context, Result};
use docsync_core::{
    drive, CollabSession, ConnectionStatus, EditabilityPolicy, Role, SessionConfig,
    SessionMetadata, StatusChange, TransportEvent,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What happened to one replayed report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum StepOutcome {
    /// Status changed
    Applied,
    /// Same as the current status
    Unchanged,
    /// Outside the transition table
    Rejected(String),
    /// Not a known status string
    Unknown,
}

/// One line of a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayStep {
    /// Position in the input
    pub index: usize,
    /// Raw value as read
    pub raw: String,
    /// Result of applying it
    pub outcome: StepOutcome,
    /// Session status afterwards
    pub status: ConnectionStatus,
    /// Gate for the reported value; unknown values are never editable
    pub editable: bool,
}

/// Replay result
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Per-report outcomes
    pub steps: Vec<ReplayStep>,
    /// Changes the session journaled
    pub changes: Vec<StatusChange>,
    /// Status at the end
    pub final_status: ConnectionStatus,
}

impl ReplayReport {
    /// Render as an aligned table
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            let outcome = match &step.outcome {
                StepOutcome::Applied => "applied".to_string(),
                StepOutcome::Unchanged => "unchanged".to_string(),
                StepOutcome::Rejected(reason) => format!("rejected ({reason})"),
                StepOutcome::Unknown => "unknown".to_string(),
            };
            out.push_str(&format!(
                "{:>4}  {:<13} {:<13} editable={:<5}  {outcome}\n",
                step.index, step.raw, step.status, step.editable
            ));
        }
        out.push_str(&format!(
            "\n{} changes, final status {}\n",
            self.changes.len(),
            self.final_status
        ));
        out
    }
}

/// Read a JSON array of status strings
pub fn load_statuses(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Read a JSON array of transport events
pub fn load_events(path: impl AsRef<Path>) -> Result<Vec<TransportEvent>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn fresh_session(config: &SessionConfig, label: &str) -> Result<CollabSession> {
    let session = CollabSession::new(config.clone());
    session
        .hydrate(SessionMetadata::new(label, Role::Editor), &LoggingSink)
        .context("hydrating replay session")?;
    Ok(session)
}

/// Apply raw status strings to a fresh session, in order
pub fn replay_statuses(raws: &[String], config: &SessionConfig) -> Result<ReplayReport> {
    let session = fresh_session(config, "replay")?;
    let steps = raws
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let (outcome, editable) = match raw.parse::<ConnectionStatus>() {
                Err(_) => {
                    tracing::warn!(value = %raw, "unknown status in replay");
                    (StepOutcome::Unknown, false)
                }
                Ok(status) => {
                    let outcome = match session.apply_status(status) {
                        Ok(Some(_)) => StepOutcome::Applied,
                        Ok(None) => StepOutcome::Unchanged,
                        Err(err) => StepOutcome::Rejected(err.to_string()),
                    };
                    (outcome, session.is_editable())
                }
            };
            ReplayStep {
                index,
                raw: raw.clone(),
                outcome,
                status: session.status(),
                editable,
            }
        })
        .collect();

    Ok(ReplayReport {
        steps,
        changes: session.journal().changes(),
        final_status: session.status(),
    })
}

/// Result of pushing events through [`drive`]
#[derive(Debug, Clone, Serialize)]
pub struct DriveReport {
    /// Events sent
    pub events: usize,
    /// Events that changed the status
    pub applied: u64,
    /// Changes the session journaled
    pub changes: Vec<StatusChange>,
    /// Status at the end
    pub final_status: ConnectionStatus,
    /// Gate at the end
    pub editable: bool,
}

/// Feed `events` through the async driver on a fresh session
pub async fn drive_events(events: Vec<TransportEvent>, config: &SessionConfig) -> Result<DriveReport> {
    let session = Arc::new(fresh_session(config, "drive")?);
    let (tx, rx) = mpsc::channel(events.len().max(1));
    let driver = tokio::spawn(drive(Arc::clone(&session), rx));

    let count = events.len();
    for event in events {
        tx.send(event).await.context("driver stopped early")?;
    }
    drop(tx);
    let applied = driver.await.context("driver task failed")?;

    Ok(DriveReport {
        events: count,
        applied,
        changes: session.journal().changes(),
        final_status: session.status(),
        editable: session.is_editable(),
    })
}

/// Row of the editability table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// Status
    pub status: ConnectionStatus,
    /// Edits accepted
    pub editable: bool,
    /// Indicator label for an editor
    pub label: String,
}

/// Gate and indicator for every status under `policy`
#[must_use]
pub fn editability_table(policy: EditabilityPolicy) -> Vec<TableRow> {
    ConnectionStatus::ALL
        .into_iter()
        .map(|status| {
            let e = policy.evaluate(status, Role::Editor);
            TableRow {
                status,
                editable: e.editable,
                label: e.indicator.label,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raws(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn replay_marks_unknown_and_rejected() {
        let input = raws(&["connected", "bogus", "synced", "syncing", "disconnected", "synced"]);
        let report = replay_statuses(&input, &SessionConfig::default()).unwrap();

        let outcomes: Vec<_> = report.steps.iter().map(|s| s.outcome.clone()).collect();
        assert!(matches!(outcomes[0], StepOutcome::Applied));
        assert_eq!(outcomes[1], StepOutcome::Unknown);
        assert!(matches!(outcomes[2], StepOutcome::Rejected(_)));
        assert_eq!(outcomes[3], StepOutcome::Applied);
        assert_eq!(outcomes[4], StepOutcome::Applied);
        assert!(matches!(outcomes[5], StepOutcome::Rejected(_)));

        assert!(!report.steps[1].editable);
        assert!(!report.steps[4].editable);
        assert_eq!(report.final_status, ConnectionStatus::Disconnected);
        assert_eq!(report.changes.len(), 3);
    }

    #[test]
    fn table_has_every_status() {
        let table = editability_table(EditabilityPolicy::default());
        assert_eq!(table.len(), ConnectionStatus::ALL.len());
        let blocked: Vec<_> = table.iter().filter(|r| !r.editable).map(|r| r.status).collect();
        assert_eq!(blocked, vec![ConnectionStatus::Disconnected]);
    }

    #[tokio::test]
    async fn drive_reports_final_state() {
        let events = vec![
            TransportEvent::HandshakeSucceeded,
            TransportEvent::SyncStarted,
            TransportEvent::CaughtUp,
            TransportEvent::Failed,
        ];
        let report = drive_events(events, &SessionConfig::default()).await.unwrap();
        assert_eq!(report.events, 4);
        assert_eq!(report.applied, 4);
        assert_eq!(report.final_status, ConnectionStatus::Disconnected);
        assert!(!report.editable);
    }
}
