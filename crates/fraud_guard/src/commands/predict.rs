//! Predict command - scores transactions with the active model.

use std::path::Path;

use anyhow::{Context, Result};
use fraud_model::read_features;
use fraud_structs::Transaction;
use hot_reload::{BatchPrediction, Prediction};
use tracing::info;

use super::print_json;
use crate::App;

/// Loads the active model and scores `transaction`.
///
/// # Errors
///
/// Returns an error if no model is active or it cannot be loaded.
pub fn run(app: &App, transaction: &Transaction) -> Result<Prediction> {
    app.coordinator
        .reload()
        .context("Failed to load the active model")?;

    let prediction = app.coordinator.score(transaction)?;
    info!(
        version = prediction.version,
        fraud_probability = prediction.fraud_probability,
        risk = %prediction.risk,
        "Scored transaction"
    );
    print_json(&prediction)?;

    Ok(prediction)
}

/// Loads the active model and scores every row of a transaction CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or no model is active or
/// it cannot be loaded.
pub fn run_file(app: &App, path: &Path) -> Result<BatchPrediction> {
    let transactions: Vec<Transaction> = read_features(path)
        .with_context(|| format!("Failed to read transactions from {}", path.display()))?
        .into_iter()
        .map(Transaction::from_features)
        .collect();

    app.coordinator
        .reload()
        .context("Failed to load the active model")?;

    let batch = app.coordinator.score_batch(&transactions)?;
    print_json(&batch)?;

    Ok(batch)
}
