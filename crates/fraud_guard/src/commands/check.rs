//! Check command - asks the data monitor whether a retrain is due.

use anyhow::{Context, Result};
use tracing::info;

use super::print_json;
use crate::App;

/// Runs a monitor check and prints the result.
///
/// Returns whether a retrain is needed.
///
/// # Errors
///
/// Returns an error if the data source cannot be read.
pub fn run(app: &App, threshold: Option<u64>) -> Result<bool> {
    let check = app
        .monitor
        .check(threshold)
        .context("Retrain check failed")?;

    info!(
        should_retrain = check.should_retrain,
        new_rows = check.new_rows,
        threshold = check.threshold,
        "Checked data growth"
    );
    print_json(&check)?;

    Ok(check.should_retrain)
}
