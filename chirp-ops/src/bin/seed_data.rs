use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process::ExitCode;

use chirp_ops::config::Settings;
use chirp_ops::seeder::Seeder;
use chirp_ops::{auth, logging, store};

/// Chirp Test Data Seeder
///
/// Creates test users, follow edges, chirps, story clusters, comments,
/// nested replies and rechirps. Every record is tagged with the run's
/// timestamp, so repeated runs never collide.
#[derive(Parser, Debug)]
#[command(name = "seed-data")]
#[command(about = "Generate synthetic Chirp test data", long_about = None)]
struct Args {
    /// Number of test users to create
    #[arg(short, long)]
    users: Option<u32>,

    /// Number of story clusters
    #[arg(short, long)]
    clusters: Option<u32>,

    /// Delay after each write in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Seed for the random generator (reproducible distributions)
    #[arg(long)]
    seed: Option<u64>,

    /// Test account whose session authenticates store writes
    #[arg(long, env = "CHIRP_OPS_EMAIL")]
    operator_email: Option<String>,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    logging::init();
    let args = Args::parse();

    let mut settings = Settings::new().context("Failed to load settings")?;
    if let Some(users) = args.users {
        settings.seed.users = users;
    }
    if let Some(clusters) = args.clusters {
        settings.seed.topic_clusters = clusters;
    }
    if let Some(delay) = args.delay_ms {
        settings.seed.write_delay_ms = delay;
    }

    println!("Chirp Test Data Seeder");
    println!("======================");
    println!();
    println!("Store backend: {:?}", settings.store.backend);
    println!("Users: {}", settings.seed.users);
    println!("Story clusters: {}", settings.seed.topic_clusters);
    println!("Write delay: {}ms", settings.seed.write_delay_ms);
    println!();

    if !args.yes {
        println!("This will write test data to the configured store.");
        println!("Do you want to continue? (y/N): ");

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("Failed to read user input")?;

        let input = input.trim().to_lowercase();
        if input != "y" && input != "yes" {
            println!("Seeding cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let identity = auth::open(&settings)?;

    let id_token = match &args.operator_email {
        Some(email) => {
            let session = identity
                .sign_in(email, &settings.seed.password)
                .await
                .with_context(|| format!("Failed to sign in as {}", email))?;
            println!("Signed in as {}", session.email);
            session.id_token
        }
        None => None,
    };

    let store = store::open(&settings, id_token)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let seeder = Seeder::new(store.as_ref(), identity.as_ref(), settings.seed.clone());
    println!("Seeding run {}...", seeder.run_tag());
    let summary = seeder.run(&mut rng).await;
    summary.print();

    println!();
    // The story-cluster author alone does not make a usable data set
    if summary.users_created == 0 {
        println!("No test users were created - check the errors above.");
        return Ok(ExitCode::FAILURE);
    }
    println!(
        "Seeding finished. Remove this data with: cleanup-test-data confirm testuser1-{}@test.com",
        seeder.run_tag()
    );

    Ok(ExitCode::SUCCESS)
}
