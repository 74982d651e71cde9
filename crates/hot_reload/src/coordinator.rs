use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use fraud_model::FraudClassifier;
use fraud_structs::{FRAUD_THRESHOLD, ModelArtifact, RiskLevel, Transaction};
use registry::Registry;
use tracing::{debug, info, warn};

use crate::error::ReloadError;
use crate::info::{BatchPrediction, BatchSummary, ModelInfo, ModelStatus, Prediction};

/// A loaded model and the artifact it came from. Never mutated.
#[derive(Debug)]
pub struct ActiveModelHandle {
    pub artifact: ModelArtifact,
    pub model: FraudClassifier,
    pub loaded_at: DateTime<Utc>,
}

impl ActiveModelHandle {
    /// Scores a transaction with this handle's model.
    #[must_use]
    pub fn score(&self, transaction: &Transaction) -> Prediction {
        self.prediction(self.model.predict_proba(&transaction.features()))
    }

    /// Scores every transaction in one forward pass.
    #[must_use]
    pub fn score_batch(&self, transactions: &[Transaction]) -> BatchPrediction {
        let rows: Vec<_> = transactions.iter().map(Transaction::features).collect();
        let predictions: Vec<Prediction> = self
            .model
            .predict_batch(&rows)
            .into_iter()
            .map(|p| self.prediction(p))
            .collect();

        BatchPrediction {
            version: self.artifact.version,
            summary: BatchSummary::from_predictions(&predictions),
            predictions,
        }
    }

    fn prediction(&self, fraud_probability: f64) -> Prediction {
        Prediction {
            is_fraud: fraud_probability >= FRAUD_THRESHOLD,
            fraud_probability,
            risk: RiskLevel::from_probability(fraud_probability),
            version: self.artifact.version,
        }
    }
}

/// Result of a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub previous_version: Option<u64>,
    pub new_version: u64,
}

impl ReloadOutcome {
    /// Returns true if the served model was replaced.
    #[must_use]
    pub fn swapped(&self) -> bool {
        self.previous_version != Some(self.new_version)
    }
}

/// Owns the served model and swaps it when the registry's active version
/// changes.
pub struct HotReloadCoordinator {
    registry: Arc<Registry>,
    active: RwLock<Option<Arc<ActiveModelHandle>>>,
    reload_lock: Mutex<()>,
}

impl HotReloadCoordinator {
    /// Creates a coordinator with nothing loaded yet.
    #[must_use]
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            active: RwLock::new(None),
            reload_lock: Mutex::new(()),
        }
    }

    /// The handle being served, or `None` before the first successful load.
    #[must_use]
    pub fn current(&self) -> Option<Arc<ActiveModelHandle>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Loads the registry's active version if it differs from the one served.
    ///
    /// Reloading the version already served is a no-op. Reloads are
    /// serialized; concurrent readers keep using the incumbent until the
    /// replacement is fully loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::NoActiveModel`] if the registry has no active
    /// version, or [`ReloadError::ModelLoad`] if the artifact fails its
    /// checksum or cannot be decoded. The incumbent keeps serving either way.
    pub fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        let _reload = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous_version = self.current().map(|handle| handle.artifact.version);
        self.swap_in_active(previous_version).inspect_err(|e| {
            warn!(
                error = %e,
                serving = previous_version,
                "Model reload failed, keeping incumbent"
            );
        })
    }

    fn swap_in_active(&self, previous_version: Option<u64>) -> Result<ReloadOutcome, ReloadError> {
        let artifact = self.registry.get_active()?;
        let new_version = artifact.version;

        if previous_version == Some(new_version) {
            debug!(version = new_version, "Active model already loaded");
            return Ok(ReloadOutcome {
                previous_version,
                new_version,
            });
        }

        let bytes = self.registry.read_model(&artifact)?;
        let model =
            FraudClassifier::from_bytes(&bytes).map_err(|e| ReloadError::ModelLoad {
                version: new_version,
                reason: e.to_string(),
            })?;

        let handle = Arc::new(ActiveModelHandle {
            artifact,
            model,
            loaded_at: Utc::now(),
        });
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!(
            previous_version,
            new_version, "Hot-swapped active model"
        );
        Ok(ReloadOutcome {
            previous_version,
            new_version,
        })
    }

    /// Scores a transaction with the served model.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::NoActiveModel`] if nothing has been loaded.
    pub fn score(&self, transaction: &Transaction) -> Result<Prediction, ReloadError> {
        let handle = self.current().ok_or(ReloadError::NoActiveModel)?;
        Ok(handle.score(transaction))
    }

    /// Scores a batch against a single snapshot of the served model, so a
    /// concurrent reload never splits one batch across versions.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::NoActiveModel`] if nothing has been loaded.
    pub fn score_batch(&self, transactions: &[Transaction]) -> Result<BatchPrediction, ReloadError> {
        let handle = self.current().ok_or(ReloadError::NoActiveModel)?;
        let batch = handle.score_batch(transactions);
        info!(
            version = batch.version,
            total = batch.summary.total_transactions,
            fraud_detected = batch.summary.fraud_detected,
            "Scored transaction batch"
        );
        Ok(batch)
    }

    /// Health and provenance of the served model.
    #[must_use]
    pub fn info(&self) -> ModelInfo {
        let Some(handle) = self.current() else {
            return ModelInfo::no_model();
        };
        let run = &handle.artifact.metadata;

        ModelInfo {
            status: ModelStatus::Healthy,
            active_version: Some(handle.artifact.version),
            trained_at: Some(run.finished_at),
            sample_count: Some(run.sample_count),
            feature_names: handle.model.feature_names.clone(),
            cv_auc: Some(run.cv_auc),
            test_auc: Some(run.test_auc),
            loaded_at: Some(handle.loaded_at),
        }
    }
}
