//! Multi-sensor recorder entry point

use clap::Parser;
use recorder_cli::{build_orchestrator, init_logging, print_summary, run_auto, run_manual};
use sensor_core::RecorderConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "recorder", about = "Multi-sensor time-synchronized recorder")]
struct Args {
    /// Root directory for session output
    #[arg(long, default_value = "recordings")]
    output_dir: PathBuf,
    /// Configuration file (TOML), layered with RECORDER_* env vars
    #[arg(long)]
    config: Option<PathBuf>,
    /// Session name; a timestamped name is generated when omitted
    #[arg(long)]
    session_name: Option<String>,
    /// Recording duration in seconds
    #[arg(long, default_value_t = 5.0)]
    duration: f64,
    /// Drive the session through the distance-based auto-recorder
    #[arg(long)]
    auto: bool,
    /// Number of synthetic secondary sensors alongside the reference camera
    #[arg(long, default_value_t = 1)]
    secondary_sensors: usize,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    info!("=== Multisense Recorder v{} ===", env!("CARGO_PKG_VERSION"));
    let config = match &args.config {
        Some(path) => RecorderConfig::from_file(path)?,
        None => RecorderConfig::default(),
    };

    let orchestrator = build_orchestrator(
        &args.output_dir,
        args.session_name.clone(),
        &config,
        args.secondary_sensors,
    )?;

    let result = if args.auto {
        run_auto(orchestrator, &config, args.duration)?
    } else {
        run_manual(orchestrator, &config, args.duration)?
    };
    print_summary(&result);
    Ok(())
}
