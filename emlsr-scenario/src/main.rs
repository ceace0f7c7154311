//! EMLSR Scenario Runner
//!
//! Loads a JSON scenario, runs it on virtual time and prints what the
//! coordinator did.
//!
//! ```text
//! emlsr-scenario scenarios/access_and_return.json
//! emlsr-scenario --default-config > my_config.json
//! ```

use std::path::PathBuf;

use emlsr_mux::CoordinatorConfig;
use emlsr_sim::{ScenarioFile, SimError, Simulation};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: emlsr-scenario <scenario.json> | --default-config";

#[derive(Debug, Error)]
enum ScenarioError {
    #[error("{0}")]
    Usage(&'static str),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("cannot encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

enum Command {
    Run(PathBuf),
    DefaultConfig,
}

fn parse_args() -> Result<Command, ScenarioError> {
    let mut args = std::env::args().skip(1);
    let command = match args.next().as_deref() {
        Some("--default-config") => Command::DefaultConfig,
        Some("-h") | Some("--help") | None => return Err(ScenarioError::Usage(USAGE)),
        Some(path) => Command::Run(PathBuf::from(path)),
    };
    if args.next().is_some() {
        return Err(ScenarioError::Usage(USAGE));
    }
    Ok(command)
}

fn run(path: PathBuf) -> Result<(), ScenarioError> {
    let json = std::fs::read_to_string(&path).map_err(|source| ScenarioError::Io {
        path: path.clone(),
        source,
    })?;
    let scenario = ScenarioFile::from_json(&json)?;
    tracing::info!(
        "Loaded {} ({} steps, until {})",
        path.display(),
        scenario.script.len(),
        scenario.end_time()
    );

    let mut sim = Simulation::new(scenario.config.clone()).map_err(SimError::from)?;
    let reports = sim.run_script(&scenario.script);
    sim.run_until(scenario.end_time());

    println!("== steps");
    for report in &reports {
        match &report.outcome {
            Ok(outcome) => println!("[{}] {:?} -> {:?}", report.at, report.action, outcome),
            Err(err) => println!("[{}] {:?} -> error: {}", report.at, report.action, err),
        }
    }

    println!("== events");
    for entry in sim.trace() {
        println!("[{}] {:?}", entry.at, entry.event);
    }

    let coordinator = sim.coordinator();
    println!("== final state at {}", sim.now());
    for (radio, link) in coordinator.binding().pairs() {
        println!("{} on {}", radio, link);
    }
    for radio in coordinator.radios().filter(|r| r.is_switching()) {
        println!("{} switching", radio.id);
    }
    let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
    tracing::info!(
        "{} events, {} switch commands, {} failed steps",
        sim.trace().len(),
        coordinator.phy().switch_log().len(),
        failed
    );
    Ok(())
}

fn main() -> Result<(), ScenarioError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "emlsr_scenario=info,emlsr_mux=info,emlsr_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::Run(path) => run(path),
        Command::DefaultConfig => {
            let json = serde_json::to_string_pretty(&CoordinatorConfig::default())?;
            println!("{}", json);
            Ok(())
        }
    }
}
