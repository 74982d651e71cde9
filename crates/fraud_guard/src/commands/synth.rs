//! Synth command - appends synthetic labelled transactions to the data CSV.

use anyhow::{Context, Result};
use fraud_model::{count_csv_rows, synthetic};
use tracing::info;

use crate::App;

/// Appends `rows` synthetic transactions to the configured data file.
///
/// Without an explicit seed the current row count is used, so repeated
/// calls keep adding fresh rows.
///
/// # Errors
///
/// Returns an error if the data file cannot be written.
pub fn run(app: &App, rows: usize, fraud_rate: f64, seed: Option<u64>) -> Result<u64> {
    let path = &app.config.data_path;
    let existing = count_csv_rows(path).unwrap_or(0);
    let seed = seed.unwrap_or(existing);

    let data = synthetic::generate(rows, fraud_rate, seed);
    data.append_csv(path)
        .with_context(|| format!("Failed to append to {}", path.display()))?;

    let total = existing + data.len() as u64;
    info!(
        path = %path.display(),
        added = data.len(),
        fraud = data.positives(),
        total,
        "Appended synthetic transactions"
    );
    Ok(total)
}
