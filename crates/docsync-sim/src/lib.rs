//! docsync simulator
//!
//! Seeded simulation, stress and replay tooling for [`docsync_core`]
//! sessions. The `docsync-sim` binary is a thin CLI over this library.

#![warn(missing_docs)]

pub mod harness;
pub mod replay;
pub mod simulator;

pub use harness::{CertificationReport, StressTestReport, TestHarness};
pub use replay::{
    drive_events, editability_table, load_events, load_statuses, replay_statuses, DriveReport,
    ReplayReport, ReplayStep, StepOutcome, TableRow,
};
pub use simulator::{
    run_simulator, InvariantCheck, LoggingSink, SimulatorConfig, SimulatorReport, SimulatorStats,
    Violation,
};
