use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use chirp_ops::config::Settings;
use chirp_ops::env::EnvSnapshot;
use chirp_ops::logging;
use chirp_ops::readiness::run_readiness;

/// Chirp Production Readiness Check
///
/// Verifies required environment variables, interval thresholds and source
/// files of a web app checkout before it is deployed.
#[derive(Parser, Debug)]
#[command(name = "check-readiness")]
#[command(about = "Check environment and files before deploying Chirp", long_about = None)]
struct Args {
    /// Root of the web app checkout
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Env file to read, relative to the root
    #[arg(short, long, default_value = ".env")]
    env_file: PathBuf,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init();

    let env = EnvSnapshot::load(&args.root.join(&args.env_file));
    let settings = Settings::load(&env).context("Failed to load settings")?;

    println!("Project root: {}", args.root.display());
    println!();

    let report = run_readiness(&env, &args.root, &settings.readiness.required_files);
    report.print("Chirp Production Readiness");

    Ok(report.exit_code())
}
