use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use chirp_ops::assertions::{configured_assertions, run_assertions};
use chirp_ops::config::Settings;
use chirp_ops::logging;

/// Static Source Assertions
///
/// Checks that source files of the web app contain expected snippets.
/// Nothing is executed; these are textual smoke tests.
#[derive(Parser, Debug)]
#[command(name = "check-source")]
#[command(about = "Assert expected snippets in Chirp source files", long_about = None)]
struct Args {
    /// Root of the web app checkout
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    logging::init();
    let args = Args::parse();

    let settings = Settings::new().context("Failed to load settings")?;
    let assertions = configured_assertions(&settings.assertions);

    let report = run_assertions(&args.root, &assertions);
    report.print("Chirp Source Assertions");

    Ok(report.exit_code())
}
