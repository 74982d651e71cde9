//! Training logic for the fraud classifier.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::data::dataset::Dataset as _;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use fraud_structs::{FEATURE_COUNT, feature_names};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::batch::{TransactionBatch, TransactionBatcher, TransactionDataset};
use crate::dataset::Dataset;
use crate::error::TrainingError;
use crate::network::FraudNet;
use crate::{FraudClassifier, TrainingConfig};

type TrainBackend = Autodiff<NdArray>;

/// Keeps `ln` away from zero in the loss.
const PROBABILITY_EPSILON: f32 = 1e-7;

/// Fits a class-balanced logistic regression on standardised features.
///
/// Mini-batch Adam over a weighted binary cross-entropy. Each class
/// contributes equally to the loss regardless of how rare fraud is.
///
/// # Errors
///
/// Returns an error if the data is empty or contains a single class.
pub fn fit(data: &Dataset, config: &TrainingConfig) -> Result<FraudClassifier, TrainingError> {
    if data.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }
    let positives = data.positives();
    if positives == 0 || positives == data.len() {
        return Err(TrainingError::SingleClass {
            positives,
            total: data.len(),
        });
    }

    let (means, scales) = standardisation(data);
    let dataset = TransactionDataset::new(data, &means, &scales);

    let device = NdArrayDevice::default();
    let mut model = FraudNet::<TrainBackend>::new(&device);
    train(&mut model, &dataset, config, &device);

    let (weights, bias) = model
        .valid()
        .parameters()
        .map_err(TrainingError::Tensor)?;

    Ok(FraudClassifier {
        feature_names: feature_names(),
        means: means.to_vec(),
        scales: scales.to_vec(),
        weights,
        bias,
    })
}

/// Runs the optimisation loop in place.
fn train<B: AutodiffBackend>(
    model: &mut FraudNet<B>,
    dataset: &TransactionDataset,
    config: &TrainingConfig,
    device: &B::Device,
) {
    let batcher = TransactionBatcher::<B>::new(device.clone());
    let mut optimizer = AdamConfig::new().init::<B, FraudNet<B>>();
    let batch_size = config.batch_size.max(1);

    let num_samples = dataset.len();
    let mut indices: Vec<usize> = (0..num_samples).collect();

    for epoch in 0..config.epochs {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(epoch as u64));
        indices.shuffle(&mut rng);

        let mut epoch_loss = 0.0;
        let mut batch_count = 0u32;

        for chunk in indices.chunks(batch_size) {
            let items: Vec<_> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let loss = weighted_bce(model, batcher.batch(items));
            epoch_loss += scalar(&loss);
            batch_count += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, model);
            *model = optimizer.step(config.learning_rate, model.clone(), grads);
        }

        if epoch % 25 == 0 || epoch + 1 == config.epochs {
            let mean_loss = if batch_count > 0 {
                epoch_loss / f64::from(batch_count)
            } else {
                0.0
            };
            debug!(epoch, loss = mean_loss, "Training progress");
        }
    }
}

/// `-mean(w * (y ln p + (1 - y) ln(1 - p)))`
fn weighted_bce<B: Backend>(model: &FraudNet<B>, batch: TransactionBatch<B>) -> Tensor<B, 1> {
    let probs = model
        .forward(batch.inputs)
        .clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);

    let log_p = probs.clone().log();
    let log_not_p = probs.neg().add_scalar(1.0).log();
    let not_targets = batch.targets.clone().neg().add_scalar(1.0);

    batch
        .targets
        .mul(log_p)
        .add(not_targets.mul(log_not_p))
        .mul(batch.weights)
        .neg()
        .mean()
}

fn scalar<B: Backend>(loss: &Tensor<B, 1>) -> f64 {
    loss.clone()
        .into_data()
        .to_vec::<f32>()
        .ok()
        .and_then(|values| values.first().copied())
        .map_or(0.0, f64::from)
}

/// Per-feature mean and standard deviation (1.0 for constant features).
fn standardisation(data: &Dataset) -> ([f32; FEATURE_COUNT], [f32; FEATURE_COUNT]) {
    let n = data.len() as f64;
    let mut means = [0.0f64; FEATURE_COUNT];
    for row in &data.features {
        for (m, x) in means.iter_mut().zip(row) {
            *m += x / n;
        }
    }

    let mut variances = [0.0f64; FEATURE_COUNT];
    for row in &data.features {
        for ((v, x), m) in variances.iter_mut().zip(row).zip(&means) {
            *v += (x - m).powi(2) / n;
        }
    }

    let mut scales = [1.0f32; FEATURE_COUNT];
    for (s, v) in scales.iter_mut().zip(variances) {
        let sd = v.sqrt() as f32;
        if sd.is_normal() {
            *s = sd;
        }
    }

    (means.map(|m| m as f32), scales)
}
