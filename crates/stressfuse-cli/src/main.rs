use std::path::PathBuf;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use stressfuse_core::{
    Clock, ManualClock, Millis, MonitorError, SimScenario, SimulatedRig, StatusLine, StressConfig,
    StressMonitor,
};

#[derive(Parser)]
#[command(name = "stressfuse", version, about = "Multi-sensor stress monitor")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor against the simulated sensor rig
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Simulated seconds to run
        #[arg(long, default_value_t = 180)]
        duration_s: u32,
        #[arg(long, default_value = "aroused")]
        scenario: SimScenario,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Emit JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the default configuration as TOML
    DefaultConfig,
    /// Load and validate a configuration file
    Validate { path: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Run {
            config,
            duration_s,
            scenario,
            seed,
            json,
        } => {
            let config = StressConfig::load_layered(config.as_deref())?;
            run(config, scenario, seed, duration_s, json)?;
        }
        Commands::DefaultConfig => {
            print!("{}", StressConfig::default().to_toml_string()?);
        }
        Commands::Validate { path } => {
            StressConfig::from_file_with_env(&path)?;
            println!("{}: ok", path.display());
        }
    }
    Ok(())
}

fn run(
    config: StressConfig,
    scenario: SimScenario,
    seed: u64,
    duration_s: u32,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Rc::new(ManualClock::new(0));
    let rig = SimulatedRig::new(scenario.profile(seed), Rc::clone(&clock)).into_sensor_rig();

    let mut monitor = match StressMonitor::start(config, rig, 0) {
        Ok(m) => m,
        Err(MonitorError::Sensor(e)) => {
            print_status(&StatusLine::SensorFault, 0, json)?;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    log::info!("Running {:?} scenario (seed {}) for {} s", scenario, seed, duration_s);

    let end_ms = duration_s.saturating_mul(1_000);
    while clock.now_ms() < end_ms {
        let now = clock.advance(1);
        let report = monitor.tick(now);
        if let Some(status) = report.status {
            print_status(&status, now, json)?;
        }
        if json {
            if let Some(diag) = report.diagnostics {
                println!("{}", diag.to_json()?);
            }
        }
    }
    Ok(())
}

fn print_status(status: &StatusLine, now: Millis, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(status)?);
    } else {
        println!("[{:>7.1}s] {}", now as f32 / 1_000.0, status);
    }
    Ok(())
}
