use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use chirp_ops::config::Settings;
use chirp_ops::logging;
use chirp_ops::probes::{check_health, setup_instructions};

/// Deployment Health Check
///
/// Calls the deployed app's health endpoint and reports whether the
/// required secret is visible to it, read from the `<secret>Configured`
/// flag of the health body.
#[derive(Parser, Debug)]
#[command(name = "check-health")]
#[command(about = "Check the deployed Chirp health endpoint", long_about = None)]
struct Args {
    /// Health endpoint URL (defaults to the configured one)
    #[arg(short, long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    logging::init();
    let args = Args::parse();

    let settings = Settings::new().context("Failed to load settings")?;
    let url = args.url.unwrap_or_else(|| settings.probes.health_url.clone());
    let secret = &settings.probes.required_secret;

    println!("Deployment Health Check");
    println!("=======================");
    println!();
    println!("Endpoint: {}", url);
    println!();

    let client = reqwest::Client::new();
    let check = match check_health(&client, &url, secret).await {
        Ok(check) => check,
        Err(e) => {
            eprintln!("ERROR: Health check failed: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("Status: {}", check.report.status);
    if let Some(environment) = &check.report.environment {
        println!("Environment: {}", environment);
    }

    if check.secret_visible {
        println!("✓ {} is visible to the deployment", secret);
        return Ok(ExitCode::SUCCESS);
    }

    println!("✗ {} is NOT visible to the deployment", secret);
    println!();
    println!("Setup instructions:");
    for step in setup_instructions(secret) {
        println!("  {}", step);
    }
    Ok(ExitCode::FAILURE)
}
