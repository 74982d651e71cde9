use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quality gates and retention settings for retraining.
///
/// Loaded once at process start and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetrainPolicy {
    /// Minimum number of new rows since the last accepted run before retraining.
    pub min_new_rows: u64,
    /// Candidates scoring below this held-out AUC are rejected.
    pub min_test_auc: f64,
    /// Largest tolerated drop in held-out AUC relative to the incumbent.
    pub max_degradation: f64,
    /// Keep superseded artifacts as backups.
    pub backup_enabled: bool,
    /// Run the smoke-test collaborator before committing.
    pub run_post_train_checks: bool,
    /// How many superseded versions to retain when backups are enabled.
    pub backup_retention: usize,
    /// Retrain once the active model is older than this, regardless of
    /// new data. `None` disables the age trigger.
    #[serde(default = "default_max_model_age_days")]
    pub max_model_age_days: Option<u64>,
}

const fn default_max_model_age_days() -> Option<u64> {
    Some(7)
}

/// A policy value is out of range.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("backup_retention must be at least 1")]
    ZeroRetention,
}

impl Default for RetrainPolicy {
    fn default() -> Self {
        Self {
            min_new_rows: 100,
            min_test_auc: 0.85,
            max_degradation: 0.05,
            backup_enabled: true,
            run_post_train_checks: true,
            backup_retention: 3,
            max_model_age_days: default_max_model_age_days(),
        }
    }
}

impl RetrainPolicy {
    /// Checks that every threshold is within its valid range.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (name, value) in [
            ("min_test_auc", self.min_test_auc),
            ("max_degradation", self.max_degradation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PolicyError::OutOfRange { name, value });
            }
        }

        if self.backup_retention == 0 {
            return Err(PolicyError::ZeroRetention);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        assert_eq!(RetrainPolicy::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_out_of_range_auc() {
        let policy = RetrainPolicy {
            min_test_auc: 1.2,
            ..RetrainPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::OutOfRange { name: "min_test_auc", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_retention() {
        let policy = RetrainPolicy {
            backup_retention: 0,
            ..RetrainPolicy::default()
        };
        assert_eq!(policy.validate(), Err(PolicyError::ZeroRetention));
    }

    #[test]
    fn test_missing_model_age_defaults_to_a_week() {
        let json = r#"{
            "min_new_rows": 100,
            "min_test_auc": 0.85,
            "max_degradation": 0.05,
            "backup_enabled": true,
            "run_post_train_checks": true,
            "backup_retention": 3
        }"#;
        let policy: RetrainPolicy = serde_json::from_str(json).expect("deserialize");
        assert_eq!(policy.max_model_age_days, Some(7));
        assert_eq!(policy, RetrainPolicy::default());
    }
}
