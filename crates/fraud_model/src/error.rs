//! Error types for datasets, training and model loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to read transaction data.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Missing column {0:?} in header")]
    MissingColumn(String),

    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Failure inside the training backend.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("No training data provided")]
    EmptyDataset,

    #[error("Training data needs both classes, found {positives} fraud out of {total}")]
    SingleClass { positives: usize, total: usize },

    #[error("Failed to serialize model: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to record model weights: {0}")]
    Record(String),

    #[error("Failed to read trained weights: {0}")]
    Tensor(String),
}

/// A serialized model could not be turned back into a usable classifier.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid model encoding: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Feature schema mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Invalid model weights: {0}")]
    Record(String),

    #[error("Model parameters are malformed: {0}")]
    Malformed(&'static str),
}
