use anyhow::{bail, Context, Result};
use clap::Parser;
use std::process::ExitCode;

use chirp_ops::config::{require, Settings};
use chirp_ops::logging;
use chirp_ops::probes::{probe_models, ModelCandidate, ProbeError};

/// Generative AI Model Probe
///
/// Tries API version / model combinations in order and reports the first
/// one that answers.
#[derive(Parser, Debug)]
#[command(name = "probe-models")]
#[command(about = "Find a working generative AI version/model pair", long_about = None)]
struct Args {
    /// Candidate in `version/model` form; repeat to replace the configured list
    #[arg(short, long = "candidate")]
    candidates: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    logging::init();
    let args = Args::parse();

    let settings = Settings::new().context("Failed to load settings")?;
    let api_key = require(&settings.probes.generative_api_key, "VITE_GEMINI_API_KEY")?;

    let raw = if args.candidates.is_empty() {
        settings.probes.model_candidates.clone()
    } else {
        args.candidates
    };
    let mut candidates = Vec::with_capacity(raw.len());
    for entry in &raw {
        match ModelCandidate::parse(entry) {
            Some(candidate) => candidates.push(candidate),
            None => bail!("Invalid candidate {:?}, expected version/model", entry),
        }
    }

    println!("Generative AI Model Probe");
    println!("=========================");
    println!();
    println!("Trying {} combinations...", candidates.len());
    println!();

    let client = reqwest::Client::new();
    let outcome =
        match probe_models(&client, &settings.probes.generative_base_url, api_key, &candidates).await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                if matches!(e, ProbeError::Auth { .. }) {
                    eprintln!("Check that VITE_GEMINI_API_KEY is valid and enabled for the API.");
                }
                return Ok(ExitCode::FAILURE);
            }
        };

    for attempt in &outcome.failures {
        let status = attempt
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no response".to_string());
        println!("  ✗ {} ({}) - {}", attempt.candidate, status, attempt.message);
    }

    match outcome.working {
        Some((candidate, reply)) => {
            println!("  ✓ {}", candidate);
            println!();
            println!("Working combination found!");
            println!("  API version: {}", candidate.version);
            println!("  Model: {}", candidate.model);
            match reply {
                Some(text) => println!("  Reply: {}", text),
                None => println!("  Reply: (no generated text)"),
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!();
            println!("No working combination found.");
            Ok(ExitCode::FAILURE)
        }
    }
}
