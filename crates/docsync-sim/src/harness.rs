//! Stress and certification runs
//!
//! The stress run opens many documents in one [`SessionRegistry`] and
//! hammers each from its own thread, then checks every session's journal
//! and gate. Certification repeats the simulator over a range of seeds.

use crate::simulator::{run_simulator, LoggingSink, SimulatorConfig};
use docsync_core::state_machine::allowed_transitions;
use docsync_core::{ConnectionStatus, Role, SessionConfig, SessionMetadata, SessionRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::thread;

/// Test harness for running stress tests and certification
pub struct TestHarness;

impl TestHarness {
    /// Open `sessions` documents and drive `events` status reports into each
    #[must_use]
    pub fn run_stress_test(
        sessions: usize,
        events: usize,
        seed: u64,
        config: &SessionConfig,
    ) -> StressTestReport {
        tracing::info!(sessions, events, seed, "stress test started");

        let registry = Arc::new(SessionRegistry::new(config.clone()));
        let policy = config.editability_policy();

        thread::scope(|scope| {
            for n in 0..sessions {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    let metadata = SessionMetadata::new(format!("stress-{n}"), Role::Editor);
                    let session = match registry.open(metadata, &LoggingSink) {
                        Ok(session) => session,
                        Err(err) => {
                            tracing::error!(error = %err, "stress session failed to open");
                            return;
                        }
                    };
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(n as u64));
                    for _ in 0..events {
                        let current = session.status();
                        if current == ConnectionStatus::Disconnected {
                            let _ = session.retry();
                            continue;
                        }
                        let allowed = allowed_transitions(current);
                        let _ = session.apply_status(allowed[rng.random_range(0..allowed.len())]);
                    }
                });
            }
        });

        let mut violations = 0;
        let mut transitions = 0;
        for id in registry.document_ids() {
            let Some(session) = registry.get(&id) else {
                violations += 1;
                continue;
            };
            transitions += session.journal().len();
            if session.journal().verify_sequence().is_err() {
                tracing::warn!(document = %id, "journal out of sequence");
                violations += 1;
            }
            if session.is_editable() != policy.is_editable(session.status()) {
                tracing::warn!(document = %id, status = %session.status(), "gate disagrees with policy");
                violations += 1;
            }
        }
        let opened = registry.len();
        if opened != sessions {
            violations += sessions.abs_diff(opened);
        }

        StressTestReport {
            sessions,
            events,
            transitions,
            violations,
            success: violations == 0,
        }
    }

    /// Run the simulator once per seed in `0..seeds`
    #[must_use]
    pub fn run_certification(seeds: u64, events: u64, config: &SessionConfig) -> CertificationReport {
        let mut failed_seeds = Vec::new();
        let mut total_violations = 0;

        for seed in 0..seeds {
            let report = run_simulator(SimulatorConfig {
                seed,
                total_events: events,
                session: config.clone(),
                ..Default::default()
            });
            if !report.passed() {
                failed_seeds.push(seed);
            }
            total_violations += report.violations.len();
        }

        CertificationReport {
            passed: failed_seeds.is_empty(),
            total_violations,
            seeds_tested: seeds,
            failed_seeds,
        }
    }
}

/// Report from a stress test
#[derive(Debug, Clone, Serialize)]
pub struct StressTestReport {
    /// Documents opened
    pub sessions: usize,
    /// Reports per document
    pub events: usize,
    /// Journaled changes across all documents
    pub transitions: usize,
    /// Failed checks
    pub violations: usize,
    /// No violations
    pub success: bool,
}

/// Report from certification
#[derive(Debug, Clone, Serialize)]
pub struct CertificationReport {
    /// Every seed passed
    pub passed: bool,
    /// Violations across all seeds
    pub total_violations: usize,
    /// Seeds run
    pub seeds_tested: u64,
    /// Seeds with at least one violation
    pub failed_seeds: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stress_run_is_clean() {
        let report = TestHarness::run_stress_test(8, 200, 1, &SessionConfig::default());
        assert!(report.success, "{report:?}");
        assert_eq!(report.sessions, 8);
        assert!(report.transitions > 0);
    }

    #[test]
    fn certification_over_few_seeds() {
        let report = TestHarness::run_certification(3, 300, &SessionConfig::default());
        assert!(report.passed, "{report:?}");
        assert_eq!(report.seeds_tested, 3);
        assert!(report.failed_seeds.is_empty());
    }
}
