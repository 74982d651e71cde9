use registry::RegistryError;
use thiserror::Error;

/// Reload and scoring errors. The incumbent model is never affected.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("No active model")]
    NoActiveModel,

    #[error("Failed to load model v{version}: {reason}")]
    ModelLoad { version: u64, reason: String },

    #[error(transparent)]
    Registry(RegistryError),
}

impl From<RegistryError> for ReloadError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NoActiveModel => Self::NoActiveModel,
            RegistryError::Corrupt { version, reason } => Self::ModelLoad { version, reason },
            other => Self::Registry(other),
        }
    }
}
