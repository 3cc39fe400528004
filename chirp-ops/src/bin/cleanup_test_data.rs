use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use chirp_ops::cleanup::{run_gated, CleanupGate, CleanupRun, CONFIRM_TOKEN};
use chirp_ops::config::Settings;
use chirp_ops::{auth, logging, store};

/// Chirp Test Data Cleanup
///
/// Deletes every user whose email matches a test-data pattern, together
/// with their chirps, comments and personalized news items. Requires the
/// `confirm` token and the email of a test account to sign in as.
#[derive(Parser, Debug)]
#[command(name = "cleanup-test-data")]
#[command(about = "Delete seeded Chirp test data", long_about = None)]
struct Args {
    /// Pass `confirm` to perform the deletion
    confirm: Option<String>,

    /// Email of a test account to authenticate as
    email: Option<String>,

    /// Documents deleted per batch
    #[arg(long)]
    batch_size: Option<usize>,
}

fn print_warning() {
    println!("⚠ This permanently deletes all test users and their content:");
    println!("  chirps, comments and personalized news items.");
    println!();
    println!("Nothing was deleted. To proceed, run:");
    println!("  cleanup-test-data {} <test-account-email>", CONFIRM_TOKEN);
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    logging::init();
    let args = Args::parse();

    println!("Chirp Test Data Cleanup");
    println!("=======================");
    println!();

    let settings = Settings::new().context("Failed to load settings")?;
    let gate = CleanupGate::evaluate(
        args.confirm.as_deref(),
        args.email.as_deref(),
        settings.cleanup.password.as_deref(),
    );

    match &gate {
        CleanupGate::Unconfirmed => print_warning(),
        CleanupGate::MissingEmail => {
            eprintln!("ERROR: No authentication email supplied.");
            eprintln!("Cleanup must run as a signed-in test account, e.g.:");
            eprintln!("  cleanup-test-data {} testuser1-<timestamp>@test.com", CONFIRM_TOKEN);
        }
        CleanupGate::NotTestEmail(email) => {
            eprintln!("ERROR: {} is not a test account; refusing to continue.", email);
        }
        CleanupGate::MissingPassword(email) => {
            eprintln!("ERROR: TEST_USER_PASSWORD is not set; cannot sign in as {}.", email);
        }
        CleanupGate::Proceed { email, .. } => println!("Signing in as {}...", email),
    }
    if !matches!(gate, CleanupGate::Proceed { .. }) {
        return Ok(ExitCode::from(gate.exit_status()));
    }

    let identity = auth::open(&settings)?;
    let batch_size = args.batch_size.unwrap_or(settings.cleanup.batch_size);
    let run = run_gated(
        gate,
        identity.as_ref(),
        |id_token| store::open(&settings, id_token),
        batch_size,
    )
    .await?;

    match &run {
        CleanupRun::Skipped(_) => {}
        CleanupRun::SignInFailed(e) => eprintln!("ERROR: Authentication failed: {}", e),
        CleanupRun::Completed(summary) => {
            if summary.users_matched == 0 && summary.errors.is_empty() {
                println!("No test users found - nothing to clean up.");
            }
            summary.print();
        }
    }

    Ok(ExitCode::from(run.exit_status()))
}
