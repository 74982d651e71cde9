//! Retrain command - checks the data and runs the orchestrator.

use anyhow::{Context, Result};
use fraud_structs::TrainingRun;
use orchestrator::CancelToken;
use tracing::info;

use super::print_json;
use crate::App;

/// Retrains when the monitor says so, or unconditionally with `force`.
///
/// A running `watch` process picks up an accepted model on its next tick.
///
/// # Errors
///
/// Returns an error if the data cannot be read, another run is in
/// progress, or the run cannot be recorded. Rejected candidates are not
/// errors.
pub fn run(app: &App, threshold: Option<u64>, force: bool) -> Result<Option<TrainingRun>> {
    let run = app
        .orchestrator
        .check_and_run(threshold, force, &CancelToken::new())
        .context("Retrain failed")?;

    match &run {
        Some(run) => {
            info!(
                run_id = %run.run_id,
                decision = %run.decision,
                version = run.version,
                "Retrain finished"
            );
            print_json(run)?;
        }
        None => info!("No retrain needed (use --force to override)"),
    }

    Ok(run)
}
