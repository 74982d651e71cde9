use registry::RegistryError;
use thiserror::Error;
use uuid::Uuid;

/// Monitor errors
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The data source could not be read; no retrain decision was made.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Run {0} is not an accepted run in the registry")]
    UnknownRun(Uuid),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to persist monitor event: {0}")]
    Persist(#[from] std::io::Error),
}
