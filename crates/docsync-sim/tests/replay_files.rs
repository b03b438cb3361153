use docsync_core::{ConnectionStatus, SessionConfig};
use docsync_sim::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_json(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn test_replay_from_file() {
    let file = write_json(r#"["connected", "syncing", "synced", "offline", "publishing", "synced"]"#);
    let raws = load_statuses(file.path()).unwrap();
    let report = replay_statuses(&raws, &SessionConfig::default()).unwrap();

    assert_eq!(report.steps.len(), 6);
    assert_eq!(report.steps[3].outcome, StepOutcome::Unknown);
    assert!(!report.steps[3].editable);
    assert_eq!(report.steps[3].status, ConnectionStatus::Synced);
    assert_eq!(report.final_status, ConnectionStatus::Synced);
    assert_eq!(report.changes.len(), 5);
}

#[test]
fn test_replay_rejects_malformed_file() {
    let file = write_json(r#"{"not": "an array"}"#);
    assert!(load_statuses(file.path()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_statuses(dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("reading"));
}

#[tokio::test]
async fn test_drive_from_file() {
    let file = write_json(
        r#"["handshake_succeeded", "backpressure", {"backpressure_relieved": "syncing"}, "caught_up", "failed", "retry"]"#,
    );
    let events = load_events(file.path()).unwrap();
    let report = drive_events(events, &SessionConfig::default()).await.unwrap();

    assert_eq!(report.events, 6);
    assert_eq!(report.applied, 6);
    assert_eq!(report.final_status, ConnectionStatus::Connecting);
    assert!(report.editable);
}

#[test]
fn test_table_follows_config() {
    let config = SessionConfig::from_toml_str("overloaded_editable = false").unwrap();
    let table = editability_table(config.editability_policy());
    let blocked: Vec<_> = table.iter().filter(|r| !r.editable).map(|r| r.status).collect();
    assert_eq!(blocked, vec![ConnectionStatus::Overloaded, ConnectionStatus::Disconnected]);
}

#[test]
fn test_simulator_passes_with_last_write_wins() {
    let config = SessionConfig::from_toml_str(r#"transition_policy = "last_write_wins""#).unwrap();
    let report = run_simulator(SimulatorConfig {
        seed: 3,
        total_events: 1_000,
        illegal_event_ratio: 0.3,
        session: config,
        ..Default::default()
    });
    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.stats.rejected, 0);
}
