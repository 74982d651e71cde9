//! Fraud classifier, training backend and dataset utilities.
//!
//! The classifier is a class-balanced logistic regression over
//! standardised features, trained and evaluated with Burn on the `NdArray`
//! backend. The lifecycle crates only rely on the [`TrainingBackend`]
//! contract (fit, cross-validate, evaluate on held-out data) and on loading
//! a serialized model back.

use burn::backend::ndarray::NdArrayDevice;
use fraud_structs::{FEATURE_COUNT, feature_names};
use serde::{Deserialize, Serialize};
use tracing::info;

mod batch;
mod dataset;
mod error;
pub mod metrics;
mod network;
pub mod synthetic;
mod training;

pub use batch::{TransactionBatch, TransactionBatcher, TransactionDataset, TransactionItem};
pub use dataset::{Dataset, count_csv_rows, read_features};
pub use error::{DatasetError, ModelError, TrainingError};
pub use network::FraudNet;
pub use training::fit;

use crate::network::{InferenceBackend, inference_device};

/// Configuration for training the model.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Adam step size.
    pub learning_rate: f64,
    /// Number of full passes over the training data.
    pub epochs: usize,
    /// Rows per optimizer step.
    pub batch_size: usize,
    /// Fraction of rows held out for the test AUC.
    pub test_ratio: f64,
    /// Number of cross-validation folds on the training split.
    pub cv_folds: usize,
    /// Seed for splitting, fold assignment and shuffling.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            epochs: 100,
            batch_size: 256,
            test_ratio: 0.2,
            cv_folds: 5,
            seed: 42,
        }
    }
}

/// Stored form of a classifier: the feature schema and standardisation
/// alongside the network weights encoded by Burn's recorder.
#[derive(Deserialize, Serialize)]
struct StoredModel {
    feature_names: Vec<String>,
    means: Vec<f32>,
    scales: Vec<f32>,
    network: Vec<u8>,
}

/// A fitted fraud classifier.
///
/// Holds the weights extracted from a trained [`FraudNet`]; scoring
/// rebuilds the network on the inference backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FraudClassifier {
    pub feature_names: Vec<String>,
    means: Vec<f32>,
    scales: Vec<f32>,
    weights: Vec<f32>,
    bias: f32,
}

impl FraudClassifier {
    /// Probability that the transaction with these features is fraud.
    #[must_use]
    pub fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        self.predict_batch(std::slice::from_ref(features))
            .first()
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// Fraud probabilities for many rows in one forward pass.
    #[must_use]
    pub fn predict_batch(&self, rows: &[[f64; FEATURE_COUNT]]) -> Vec<f64> {
        if rows.is_empty() {
            return Vec::new();
        }

        let device = inference_device();
        let net = self.network(&device);
        let standardised: Vec<[f32; FEATURE_COUNT]> = rows
            .iter()
            .map(|row| batch::standardise(row, &self.means, &self.scales))
            .collect();
        let inputs = TransactionBatcher::<InferenceBackend>::new(device).inputs(&standardised);

        // f32 in, f32 out; a failed read only happens on a dtype mismatch.
        net.forward(inputs)
            .into_data()
            .to_vec::<f32>()
            .map_or_else(
                |_| vec![f64::NAN; rows.len()],
                |probs| probs.into_iter().map(f64::from).collect(),
            )
    }

    fn network(&self, device: &NdArrayDevice) -> FraudNet<InferenceBackend> {
        FraudNet::from_parameters(&self.weights, self.bias, device)
    }

    /// Serializes the model for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights cannot be recorded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TrainingError> {
        let network = self
            .network(&inference_device())
            .to_record_bytes()
            .map_err(TrainingError::Record)?;

        let stored = StoredModel {
            feature_names: self.feature_names.clone(),
            means: self.means.clone(),
            scales: self.scales.clone(),
            network,
        };
        Ok(serde_json::to_vec(&stored)?)
    }

    /// Decodes a stored model and checks it against the serving schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a model, the feature schema
    /// differs from the one served, or any parameter is not finite.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let stored: StoredModel = serde_json::from_slice(bytes)?;

        let expected = feature_names();
        if stored.feature_names != expected {
            return Err(ModelError::SchemaMismatch {
                expected,
                found: stored.feature_names,
            });
        }

        let (weights, bias) = FraudNet::from_record_bytes(stored.network)
            .and_then(|net| net.parameters())
            .map_err(ModelError::Record)?;

        let params = [&stored.means, &stored.scales, &weights];
        if params.iter().any(|p| p.len() != FEATURE_COUNT) {
            return Err(ModelError::Malformed("parameter length"));
        }
        if !bias.is_finite() || params.iter().flat_map(|p| p.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::Malformed("non-finite parameter"));
        }
        if stored.scales.iter().any(|&s| s == 0.0) {
            return Err(ModelError::Malformed("zero scale"));
        }

        Ok(Self {
            feature_names: stored.feature_names,
            means: stored.means,
            scales: stored.scales,
            weights,
            bias,
        })
    }
}

/// A fitted candidate and its quality metrics.
#[derive(Debug, Clone)]
pub struct TrainedCandidate {
    pub model: FraudClassifier,
    /// Mean ROC AUC across cross-validation folds of the training split.
    pub cv_auc: f64,
    /// ROC AUC on the held-out split.
    pub test_auc: f64,
    /// Rows the candidate was built from (train + test).
    pub sample_count: u64,
    pub feature_names: Vec<String>,
}

/// Fits a model on labelled data and reports its quality.
pub trait TrainingBackend: Send + Sync {
    /// Trains a candidate on `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot produce a usable model.
    fn train(&self, data: &Dataset) -> Result<TrainedCandidate, TrainingError>;
}

/// Burn logistic-regression backend with cross-validation and a held-out
/// split.
#[derive(Debug, Clone, Default)]
pub struct LogisticBackend {
    pub config: TrainingConfig,
}

impl LogisticBackend {
    #[must_use]
    pub const fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    fn cross_validate(&self, train: &Dataset) -> Result<f64, TrainingError> {
        let folds = train.stratified_folds(self.config.cv_folds, self.config.seed);
        let mut scores = Vec::with_capacity(folds.len());

        for (k, held_out) in folds.iter().enumerate() {
            let rest: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != k)
                .flat_map(|(_, fold)| fold.iter().copied())
                .collect();

            let fold_train = train.subset(&rest);
            let fold_test = train.subset(held_out);
            let Ok(model) = fit(&fold_train, &self.config) else {
                continue;
            };
            if let Some(auc) = score_auc(&model, &fold_test) {
                scores.push(auc);
            }
        }

        metrics::mean(&scores).ok_or(TrainingError::SingleClass {
            positives: train.positives(),
            total: train.len(),
        })
    }
}

impl TrainingBackend for LogisticBackend {
    fn train(&self, data: &Dataset) -> Result<TrainedCandidate, TrainingError> {
        let (train, test) = data.stratified_split(self.config.test_ratio, self.config.seed);

        let cv_auc = self.cross_validate(&train)?;
        let model = fit(&train, &self.config)?;
        let test_auc = score_auc(&model, &test).ok_or(TrainingError::SingleClass {
            positives: test.positives(),
            total: test.len(),
        })?;

        info!(
            train_samples = train.len(),
            test_samples = test.len(),
            cv_auc,
            test_auc,
            "Trained fraud classifier"
        );

        Ok(TrainedCandidate {
            feature_names: model.feature_names.clone(),
            model,
            cv_auc,
            test_auc,
            sample_count: data.len() as u64,
        })
    }
}

fn score_auc(model: &FraudClassifier, data: &Dataset) -> Option<f64> {
    metrics::roc_auc(&model.predict_batch(&data.features), &data.labels)
}
