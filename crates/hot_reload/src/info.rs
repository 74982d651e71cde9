use chrono::{DateTime, Utc};
use fraud_structs::RiskLevel;
use serde::Serialize;

/// Whether a model is being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Healthy,
    NoModel,
}

/// Health and provenance of the served model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub status: ModelStatus,
    pub active_version: Option<u64>,
    pub trained_at: Option<DateTime<Utc>>,
    pub sample_count: Option<u64>,
    pub feature_names: Vec<String>,
    pub cv_auc: Option<f64>,
    pub test_auc: Option<f64>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl ModelInfo {
    pub(crate) const fn no_model() -> Self {
        Self {
            status: ModelStatus::NoModel,
            active_version: None,
            trained_at: None,
            sample_count: None,
            feature_names: Vec::new(),
            cv_auc: None,
            test_auc: None,
            loaded_at: None,
        }
    }
}

/// Score for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub is_fraud: bool,
    pub fraud_probability: f64,
    pub risk: RiskLevel,
    /// Version of the model that produced the score.
    pub version: u64,
}

/// Aggregate over a scored batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_transactions: usize,
    pub fraud_detected: usize,
    pub fraud_rate: f64,
    pub avg_fraud_probability: f64,
    pub max_fraud_probability: f64,
}

impl BatchSummary {
    pub(crate) fn from_predictions(predictions: &[Prediction]) -> Self {
        let total_transactions = predictions.len();
        if total_transactions == 0 {
            return Self {
                total_transactions,
                fraud_detected: 0,
                fraud_rate: 0.0,
                avg_fraud_probability: 0.0,
                max_fraud_probability: 0.0,
            };
        }

        let fraud_detected = predictions.iter().filter(|p| p.is_fraud).count();
        let n = total_transactions as f64;
        Self {
            total_transactions,
            fraud_detected,
            fraud_rate: fraud_detected as f64 / n,
            avg_fraud_probability: predictions.iter().map(|p| p.fraud_probability).sum::<f64>()
                / n,
            max_fraud_probability: predictions
                .iter()
                .map(|p| p.fraud_probability)
                .fold(0.0, f64::max),
        }
    }
}

/// Scores for a batch, all produced by one model version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPrediction {
    pub version: u64,
    pub predictions: Vec<Prediction>,
    pub summary: BatchSummary,
}
