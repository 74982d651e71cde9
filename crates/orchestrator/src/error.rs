use data_monitor::MonitorError;
use registry::RegistryError;
use thiserror::Error;

/// Failures that prevent a run from being recorded.
#[derive(Debug, Error)]
pub enum RetrainError {
    /// Another run holds the single-run token.
    #[error("A retrain run is already in progress")]
    RetrainInProgress,

    /// The training data could not be read; no decision was made.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error(transparent)]
    Monitor(MonitorError),

    #[error("Failed to record training run: {0}")]
    Registry(#[from] RegistryError),
}

impl From<MonitorError> for RetrainError {
    fn from(error: MonitorError) -> Self {
        match error {
            MonitorError::DataUnavailable(reason) => Self::DataUnavailable(reason),
            other => Self::Monitor(other),
        }
    }
}

/// Why a run ended as `RejectedError`.
#[derive(Debug, Error)]
pub(crate) enum RunFailure {
    #[error("training failed: {0}")]
    Training(#[from] fraud_model::TrainingError),

    #[error("registry failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("post-train check {check} failed: {reason}")]
    PostTrainCheck { check: String, reason: String },

    #[error("cancelled")]
    Cancelled,
}
