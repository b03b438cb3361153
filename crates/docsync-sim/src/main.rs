use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use docsync_core::SessionConfig;
use docsync_sim::{
    drive_events, editability_table, load_events, load_statuses, replay_statuses, run_simulator,
    SimulatorConfig, TestHarness,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("docsync-sim")
        .version(docsync_core::VERSION)
        .about("Simulate and replay docsync session status")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Session configuration (TOML)"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the seeded session simulator")
                .arg(
                    Arg::new("events")
                        .long("events")
                        .default_value("10000")
                        .value_parser(value_parser!(u64))
                        .help("Number of status reports to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("illegal-ratio")
                        .long("illegal-ratio")
                        .default_value("0.1")
                        .value_parser(value_parser!(f64))
                        .help("Share of reports outside the transition table"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("stress")
                .about("Drive many sessions concurrently through one registry")
                .arg(
                    Arg::new("sessions")
                        .long("sessions")
                        .default_value("64")
                        .value_parser(value_parser!(usize))
                        .help("Number of documents to open"),
                )
                .arg(
                    Arg::new("events")
                        .long("events")
                        .default_value("1000")
                        .value_parser(value_parser!(usize))
                        .help("Status reports per document"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("12345")
                        .value_parser(value_parser!(u64))
                        .help("Base seed"),
                ),
        )
        .subcommand(
            Command::new("certify")
                .about("Run the simulator over a range of seeds")
                .arg(
                    Arg::new("seeds")
                        .long("seeds")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("Seeds 0..N to run"),
                )
                .arg(
                    Arg::new("events")
                        .long("events")
                        .default_value("100000")
                        .value_parser(value_parser!(u64))
                        .help("Status reports per seed"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay a JSON array of status strings")
                .arg(file_arg())
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("drive")
                .about("Feed a JSON array of transport events through the async driver")
                .arg(file_arg())
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("table")
                .about("Print the editability table")
                .arg(json_flag()),
        )
}

fn file_arg() -> Arg {
    Arg::new("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Input file")
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn arg<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

fn load_config(matches: &ArgMatches) -> Result<SessionConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn init_tracing(config: &SessionConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    init_tracing(&config);

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let ratio: f64 = arg(args, "illegal-ratio")?;
            if !(0.0..=1.0).contains(&ratio) {
                anyhow::bail!("--illegal-ratio must be within 0..=1, got {ratio}");
            }
            let sim = SimulatorConfig {
                seed: arg(args, "seed")?,
                total_events: arg(args, "events")?,
                illegal_event_ratio: ratio,
                stop_on_first_violation: args.get_flag("stop-on-violation"),
                session: config,
            };
            tracing::info!(seed = sim.seed, events = sim.total_events, "simulation started");

            let report = run_simulator(sim);
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            Ok(exit_code(report.passed()))
        }
        Some(("stress", args)) => {
            let sessions: usize = arg(args, "sessions")?;
            let events: usize = arg(args, "events")?;
            let seed: u64 = arg(args, "seed")?;

            let report = TestHarness::run_stress_test(sessions, events, seed, &config);
            println!("Stress Test Report:");
            println!("  Sessions: {}", report.sessions);
            println!("  Events per session: {}", report.events);
            println!("  Transitions: {}", report.transitions);
            println!("  Violations: {}", report.violations);
            println!("  Success: {}", report.success);
            Ok(exit_code(report.success))
        }
        Some(("certify", args)) => {
            let report =
                TestHarness::run_certification(arg(args, "seeds")?, arg(args, "events")?, &config);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(exit_code(report.passed))
        }
        Some(("replay", args)) => {
            let path: PathBuf = arg(args, "file")?;
            let report = replay_statuses(&load_statuses(&path)?, &config)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.generate_text());
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("drive", args)) => {
            let path: PathBuf = arg(args, "file")?;
            let report = drive_events(load_events(&path)?, &config).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Events: {}", report.events);
                println!("Applied: {}", report.applied);
                println!("Final status: {}", report.final_status);
                println!("Editable: {}", report.editable);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("table", args)) => {
            let table = editability_table(config.editability_policy());
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                println!("{:<13} {:<9} label", "status", "editable");
                for row in table {
                    println!("{:<13} {:<9} {}", row.status.as_str(), row.editable, row.label);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            cli().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
