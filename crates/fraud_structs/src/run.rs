use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final outcome of a retrain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunDecision {
    Accepted,
    RejectedLowAuc,
    RejectedDegraded,
    RejectedError,
}

impl RunDecision {
    /// Returns true only for [`RunDecision::Accepted`].
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Returns the log-friendly label for this decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::RejectedLowAuc => "REJECTED_LOW_AUC",
            Self::RejectedDegraded => "REJECTED_DEGRADED",
            Self::RejectedError => "REJECTED_ERROR",
        }
    }
}

impl fmt::Display for RunDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a retrain run.
///
/// `Rejected` and `Deployed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Training,
    Validating,
    Accepted,
    Rejected,
    Committing,
    Deployed,
}

impl RunState {
    /// Returns true once the run can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Deployed)
    }

    /// Returns true if `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Training)
                | (Self::Training, Self::Validating)
                | (Self::Validating, Self::Accepted | Self::Rejected)
                | (Self::Accepted, Self::Committing)
                | (Self::Committing, Self::Deployed)
                // any failure, cancellation or storage error before deploy
                | (
                    Self::Pending | Self::Training | Self::Accepted | Self::Committing,
                    Self::Rejected
                )
        )
    }
}

/// Record of one retrain attempt, appended to the run log once decided.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrainingRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Rows of data the candidate was trained on.
    pub sample_count: u64,
    pub feature_names: Vec<String>,
    pub cv_auc: f64,
    pub test_auc: f64,
    pub decision: RunDecision,
    /// Held-out AUC of the incumbent at evaluation time.
    pub baseline_test_auc: Option<f64>,
    /// Version committed by this run, set only when accepted.
    pub version: Option<u64>,
    /// Why the run was started (threshold reached, manual, ...).
    pub reason: String,
    pub error: Option<String>,
}

impl TrainingRun {
    /// Returns true if the run produced the active artifact at commit time.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.decision.is_accepted()
    }
}
