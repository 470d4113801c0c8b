mod app;
mod credentials;
mod fetcher;
mod lister;
mod model;
mod naming;
mod pipeline;
mod publish;
mod remote;
mod remover;

use crate::model::{CleanupOutcome, ValidationResult};
use crate::naming::FileNamePattern;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use reconcile_core::config::NamingMode;
use reconcile_core::{telemetry, Config};
use std::process;
use tracing::{error, info, warn};

#[derive(Parser)]
#[clap(name = "reconcile")]
#[clap(about = "Moves the daily reconciliation file from FTP to Google Cloud Storage", version)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer today's reconciliation file
    Run {
        /// Override naming.mode
        #[clap(long, value_enum)]
        mode: Option<ModeArg>,

        /// Leave the source file on the FTP server
        #[clap(long)]
        keep_source: bool,

        /// Processing date (YYYY-MM-DD), defaults to today
        #[clap(long, env = "PROCESSING_DATE")]
        date: Option<NaiveDate>,

        /// Print the run report as JSON on stdout
        #[clap(long)]
        json: bool,
    },

    /// Check a file name against the naming contract without connecting anywhere
    Check {
        name: String,

        /// Date the name must carry (YYYY-MM-DD), defaults to today
        #[clap(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Templated,
    Discovery,
}

impl From<ModeArg> for NamingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Templated => NamingMode::Templated,
            ModeArg::Discovery => NamingMode::Discovery,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Fatal error");
        eprintln!("reconcile: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let dotenv_loaded = dotenvy::dotenv().is_ok();

    // Required values are checked per command below
    let mut config = Config::load_unchecked(None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    telemetry::init(&config.telemetry)?;

    if !dotenv_loaded {
        info!("No .env file found, using process environment");
    }

    match cli.command {
        Commands::Run {
            mode,
            keep_source,
            date,
            json,
        } => {
            if let Some(mode) = mode {
                config.naming.mode = mode.into();
            }
            if keep_source {
                config.cleanup.delete_source = false;
            }

            config
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;

            let today = date.unwrap_or_else(|| naming::today(config.naming.date_basis));

            info!(
                %today,
                mode = ?config.naming.mode,
                directory = %config.remote.directory,
                "Starting transfer"
            );

            let app = app::App::new(config)?;
            let report = app.run(today).await?;

            match &report.cleanup {
                CleanupOutcome::Removed { attempts } => info!(
                    url = %report.artifact.signed_url,
                    key = %report.artifact.object_key,
                    attempts,
                    "File uploaded to GCS and deleted from FTP"
                ),
                CleanupOutcome::Skipped => info!(
                    url = %report.artifact.signed_url,
                    key = %report.artifact.object_key,
                    "File uploaded to GCS, source left on FTP"
                ),
                CleanupOutcome::Failed { error } => warn!(
                    url = %report.artifact.signed_url,
                    key = %report.artifact.object_key,
                    source = %report.remote_path,
                    error = %error,
                    "File uploaded to GCS but NOT deleted from FTP"
                ),
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Commands::Check { name, date } => {
            let today = date.unwrap_or_else(|| naming::today(config.naming.date_basis));
            let pattern = FileNamePattern::from_config(&config.naming);

            match pattern.validate(&name, today) {
                ValidationResult::Accepted => println!("{}: accepted for {}", name, today),
                ValidationResult::Rejected(reason) => {
                    println!("{}: rejected ({})", name, reason);
                    anyhow::bail!("{} does not match the naming contract for {}", name, today);
                }
            }
        }
    }

    telemetry::shutdown();
    Ok(())
}
