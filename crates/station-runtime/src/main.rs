//! # Monitoring Station
//!
//! Entry point for the station process.
//!
//! ## Startup Sequence
//!
//! 1. Parse CLI arguments
//! 2. Load the station config (a broken config is fatal)
//! 3. Initialize logging and metrics
//! 4. Bootstrap: controllers → modules → connections
//! 5. Run until Ctrl-C, then stop every module

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use station_runtime::{controllers, ModuleFactory, Station, StationConfig};
use station_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "station")]
#[command(about = "Monitoring station runtime", long_about = None)]
#[command(version)]
struct Cli {
    /// Station config file.
    #[arg(short, long, default_value = "station.toml")]
    config: PathBuf,

    /// Print the Prometheus metrics on shutdown.
    #[arg(long)]
    dump_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match StationConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("station: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let telemetry = init_telemetry(TelemetryConfig::from_env().with_default_level(&config.app.log_level))
        .context("initializing telemetry")?;

    info!(config = %cli.config.display(), "Starting monitoring station");

    let factory = ModuleFactory::with_builtin();
    let mut station = match Station::bootstrap(&config, &factory, controllers::ALL) {
        Ok(station) => station,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Ok(ExitCode::FAILURE);
        }
    };

    info!("Station running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    for (module, e) in station.stop() {
        warn!(module = %module, error = %e, "Module did not stop cleanly");
    }

    if cli.dump_metrics {
        println!("{}", telemetry.metrics().render()?);
    }

    Ok(ExitCode::SUCCESS)
}
