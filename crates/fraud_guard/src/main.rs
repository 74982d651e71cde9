//! Fraud Guard
//!
//! Lifecycle and hot-reload service for the fraud-risk classifier.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use fraud_guard::{App, commands};
use fraud_model::synthetic::DEFAULT_FRAUD_RATE;
use fraud_structs::Transaction;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

/// Log file written by the `watch` command.
const WATCH_LOG_FILE: &str = "fraud-guard.log";

/// Fraud model lifecycle service
#[derive(Parser)]
#[command(name = "fraud-guard")]
#[command(about = "Retrains, gates and hot-reloads the fraud-risk model")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether enough new data arrived to retrain (exit 0 = retrain needed)
    Check {
        /// Override the configured minimum of new rows
        #[arg(short, long)]
        threshold: Option<u64>,
    },

    /// Retrain when enough new data arrived
    Retrain {
        /// Retrain even if the data threshold is not reached
        #[arg(short, long)]
        force: bool,

        /// Override the configured minimum of new rows
        #[arg(short, long)]
        threshold: Option<u64>,
    },

    /// Show past training runs, newest first
    History {
        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Show data monitor events instead of training runs
        #[arg(long)]
        events: bool,
    },

    /// Show health and provenance of the active model
    Info,

    /// Activate a retained model version (rollback or roll-forward)
    Activate {
        /// Version to activate
        #[arg(long)]
        version: u64,
    },

    /// Score a transaction, or every row of a CSV file, with the active model
    Predict {
        /// CSV of transactions to score as one batch
        #[arg(long, conflicts_with_all = ["time", "v1", "v2", "v4", "v11", "amount"])]
        file: Option<PathBuf>,
        #[arg(long, allow_hyphen_values = true, required_unless_present = "file")]
        time: Option<f64>,
        #[arg(long, allow_hyphen_values = true, required_unless_present = "file")]
        v1: Option<f64>,
        #[arg(long, allow_hyphen_values = true, required_unless_present = "file")]
        v2: Option<f64>,
        #[arg(long, allow_hyphen_values = true, required_unless_present = "file")]
        v4: Option<f64>,
        #[arg(long, allow_hyphen_values = true, required_unless_present = "file")]
        v11: Option<f64>,
        #[arg(long, allow_hyphen_values = true, required_unless_present = "file")]
        amount: Option<f64>,
    },

    /// Append synthetic transactions to the data file
    Synth {
        /// Number of rows to append
        #[arg(short, long, default_value = "1000")]
        rows: usize,

        /// Fraction of fraudulent rows. The default is well above real-world
        /// rates so small synthetic sets hold enough fraud to train on.
        #[arg(long, default_value_t = DEFAULT_FRAUD_RATE)]
        fraud_rate: f64,

        /// RNG seed (defaults to the current row count)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Monitor data, retrain and hot-reload until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(&cli, &config)?;

    let app = App::open(config)?;

    match cli.command {
        Commands::Check { threshold } => {
            if !commands::check::run(&app, threshold)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Retrain { force, threshold } => {
            commands::retrain::run(&app, threshold, force)?;
        }
        Commands::History { limit, events } => {
            commands::history::run(&app, limit, events)?;
        }
        Commands::Info => {
            commands::info::run(&app)?;
        }
        Commands::Activate { version } => {
            commands::activate::run(&app, version)?;
        }
        Commands::Predict { file: Some(path), .. } => {
            commands::predict::run_file(&app, &path)?;
        }
        Commands::Predict {
            time,
            v1,
            v2,
            v4,
            v11,
            amount,
            file: None,
        } => {
            let transaction = Transaction {
                time: time.context("--time is required")?,
                v1: v1.context("--v1 is required")?,
                v2: v2.context("--v2 is required")?,
                v4: v4.context("--v4 is required")?,
                v11: v11.context("--v11 is required")?,
                amount: amount.context("--amount is required")?,
            };
            commands::predict::run(&app, &transaction)?;
        }
        Commands::Synth {
            rows,
            fraud_rate,
            seed,
        } => {
            let total = commands::synth::run(&app, rows, fraud_rate, seed)?;
            info!(total, "Data file updated");
        }
        Commands::Watch => {
            info!("Fraud guard watcher starting");
            commands::watch::run(Arc::new(app)).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Console logging, plus a log file under `LOGS_DIR` for `watch`.
fn init_tracing(cli: &Cli, config: &Config) -> Result<()> {
    let env_filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(&config.log_level)
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let file_layer = if matches!(cli.command, Commands::Watch) {
        fs::create_dir_all(&config.logs_dir).with_context(|| {
            format!("Failed to create log directory {}", config.logs_dir.display())
        })?;
        let path = config.logs_dir.join(WATCH_LOG_FILE);
        let log_file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        Some(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
