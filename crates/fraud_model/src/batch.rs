//! Dataset and batching for Burn training.

use burn::prelude::*;
use fraud_structs::FEATURE_COUNT;

use crate::dataset::Dataset;

/// A single standardised, weighted row.
#[derive(Debug, Clone)]
pub struct TransactionItem {
    pub features: [f32; FEATURE_COUNT],
    /// `1.0` for fraud, `0.0` otherwise.
    pub target: f32,
    /// Class weight applied to this row's loss.
    pub weight: f32,
}

/// Training rows after standardisation and class weighting.
#[derive(Debug, Clone)]
pub struct TransactionDataset {
    items: Vec<TransactionItem>,
}

impl TransactionDataset {
    /// Standardises `data` with `means`/`scales` and attaches balanced class
    /// weights, so each class contributes equally to the loss.
    #[must_use]
    pub fn new(data: &Dataset, means: &[f32], scales: &[f32]) -> Self {
        let n = data.len() as f32;
        let positives = data.positives() as f32;
        let class_weight = [
            n / (2.0 * (n - positives).max(1.0)),
            n / (2.0 * positives.max(1.0)),
        ];

        let items = data
            .features
            .iter()
            .zip(&data.labels)
            .map(|(row, &label)| TransactionItem {
                features: standardise(row, means, scales),
                target: f32::from(label),
                weight: class_weight[usize::from(label == 1)],
            })
            .collect();

        Self { items }
    }
}

impl burn::data::dataset::Dataset<TransactionItem> for TransactionDataset {
    fn get(&self, index: usize) -> Option<TransactionItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A batch of training data.
#[derive(Debug, Clone)]
pub struct TransactionBatch<B: Backend> {
    /// Shape `[batch_size, FEATURE_COUNT]`.
    pub inputs: Tensor<B, 2>,
    /// Shape `[batch_size, 1]`.
    pub targets: Tensor<B, 2>,
    /// Shape `[batch_size, 1]`.
    pub weights: Tensor<B, 2>,
}

/// Turns dataset items into tensors on one device.
#[derive(Debug, Clone)]
pub struct TransactionBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TransactionBatcher<B> {
    #[must_use]
    pub const fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Creates a batch from a vector of items.
    pub fn batch(&self, items: Vec<TransactionItem>) -> TransactionBatch<B> {
        let batch_size = items.len();

        let mut features = Vec::with_capacity(batch_size * FEATURE_COUNT);
        let mut targets = Vec::with_capacity(batch_size);
        let mut weights = Vec::with_capacity(batch_size);
        for item in items {
            features.extend_from_slice(&item.features);
            targets.push(item.target);
            weights.push(item.weight);
        }

        TransactionBatch {
            inputs: self.tensor(&features, [batch_size, FEATURE_COUNT]),
            targets: self.tensor(&targets, [batch_size, 1]),
            weights: self.tensor(&weights, [batch_size, 1]),
        }
    }

    /// Stacks raw feature rows for inference.
    pub fn inputs(&self, rows: &[[f32; FEATURE_COUNT]]) -> Tensor<B, 2> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        self.tensor(&flat, [rows.len(), FEATURE_COUNT])
    }

    fn tensor(&self, values: &[f32], shape: [usize; 2]) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(values, &self.device).reshape(shape)
    }
}

/// `(x - mean) / scale` per feature.
pub(crate) fn standardise(
    row: &[f64; FEATURE_COUNT],
    means: &[f32],
    scales: &[f32],
) -> [f32; FEATURE_COUNT] {
    let mut out = [0.0; FEATURE_COUNT];
    for (j, value) in out.iter_mut().enumerate() {
        let mean = means.get(j).copied().unwrap_or(0.0);
        let scale = scales.get(j).copied().unwrap_or(1.0);
        *value = (row[j] as f32 - mean) / scale;
    }
    out
}
