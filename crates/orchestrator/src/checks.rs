use fraud_model::FraudClassifier;
use fraud_structs::Transaction;

/// Extra validation run on an accepted candidate before it is committed.
pub trait PostTrainCheck: Send + Sync {
    /// Short name used in logs and run records.
    fn name(&self) -> &str;

    /// Returns a reason when the model must not be committed.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the check fails.
    fn verify(&self, model: &FraudClassifier) -> Result<(), String>;
}

/// Scores a known transaction and requires a usable probability.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleTransactionCheck;

impl PostTrainCheck for SampleTransactionCheck {
    fn name(&self) -> &str {
        "sample_transaction"
    }

    fn verify(&self, model: &FraudClassifier) -> Result<(), String> {
        let probability = model.predict_proba(&Transaction::sample().features());
        if probability.is_finite() && (0.0..=1.0).contains(&probability) {
            Ok(())
        } else {
            Err(format!("sample transaction scored {probability}"))
        }
    }
}
