//! Registry error types

use std::io;

use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No active model version")]
    NoActiveModel,

    #[error("Model version not found: v{0}")]
    VersionNotFound(u64),

    #[error("Storage error while {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Artifact v{version} is corrupt: {reason}")]
    Corrupt { version: u64, reason: String },
}

impl RegistryError {
    pub(crate) fn storage(context: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
