use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::TrainingRun;

/// A committed, versioned model plus the run that produced it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelArtifact {
    /// Strictly increasing, never reused.
    pub version: u64,
    /// Location of the serialized model.
    pub path: PathBuf,
    pub metadata: TrainingRun,
    /// Lowercase hex sha-256 of the serialized model.
    pub checksum: String,
}

impl ModelArtifact {
    /// Held-out AUC recorded when this artifact was trained.
    #[must_use]
    pub const fn test_auc(&self) -> f64 {
        self.metadata.test_auc
    }
}
