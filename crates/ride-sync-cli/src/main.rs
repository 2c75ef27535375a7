mod config;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ride_sync::{DeviceIdentity, Feedback, SyncEngine};
use ride_sync_garmin::{GarminClient, GarminConfig};
use ride_sync_mywhoosh::{MyWhooshClient, MyWhooshConfig};

use crate::config::{Config, LogLevel};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "ride-sync")]
#[command(about = "Sync MyWhoosh activities to Garmin Connect")]
struct Cli {
    /// Upload without checking Garmin Connect for duplicates first
    #[arg(long, global = true)]
    no_duplicate_check: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Sync the single most recent activity (the default)
    Latest,
    /// Sync the most recent activities
    Batch {
        /// How many activities to consider, newest first
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn build_engine(config: &Config) -> Result<SyncEngine> {
    let source = MyWhooshClient::new(MyWhooshConfig {
        email: config.mywhoosh_email.clone(),
        password: config.mywhoosh_password.clone(),
        auth_base_url: None,
        api_base_url: None,
        timeout: HTTP_TIMEOUT,
    })?;

    let sink = GarminClient::new(GarminConfig {
        username: config.garmin_username.clone(),
        password: config.garmin_password.clone(),
        api_base_url: None,
        timeout: HTTP_TIMEOUT,
    })?;

    Ok(SyncEngine::new(
        Box::new(source),
        Box::new(sink),
        DeviceIdentity::default(),
    ))
}

fn print_feedback(feedback: &[Feedback], level: LogLevel) {
    for entry in feedback {
        if level == LogLevel::Warning && !entry.is_warning() {
            continue;
        }
        eprintln!("{entry}");
    }
}

/// Returns true when the run should exit zero.
async fn run(cli: &Cli, config: &Config) -> Result<bool> {
    let mut engine = build_engine(config)?;
    let check_duplicates = !cli.no_duplicate_check;

    let clean = match cli.command {
        None | Some(Command::Latest) => engine.process_latest(check_duplicates).await?,
        Some(Command::Batch { limit }) => {
            let tally = engine.process_batch(limit, check_duplicates).await?;
            println!("{tally}");
            tally.errors == 0
        }
    };

    print_feedback(engine.feedback(), config.log_level);
    Ok(clean)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::from(2);
        }
    };

    match run(&cli, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
