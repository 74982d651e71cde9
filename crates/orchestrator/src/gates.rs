//! Quality gates applied to a trained candidate.

use fraud_structs::{RetrainPolicy, RunDecision};

/// Decides whether a candidate may replace the incumbent.
///
/// Gates run in order: absolute quality first, then degradation against
/// the single incumbent's held-out AUC when there is one. A NaN AUC never
/// passes.
#[must_use]
pub fn evaluate(policy: &RetrainPolicy, test_auc: f64, baseline_test_auc: Option<f64>) -> RunDecision {
    if test_auc.is_nan() || test_auc < policy.min_test_auc {
        return RunDecision::RejectedLowAuc;
    }
    if let Some(baseline) = baseline_test_auc
        && baseline - test_auc > policy.max_degradation
    {
        return RunDecision::RejectedDegraded;
    }
    RunDecision::Accepted
}
