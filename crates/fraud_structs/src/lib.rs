//! Common structs for the fraud model lifecycle shared across crates.

use serde::{Deserialize, Serialize};

mod artifact;
mod policy;
mod risk;
mod run;
mod snapshot;

pub use artifact::*;
pub use policy::*;
pub use risk::*;
pub use run::*;
pub use snapshot::*;

/// Ordered feature schema every model is trained and served with.
pub const FEATURE_NAMES: [&str; 6] = ["Time", "V1", "V2", "V4", "V11", "Amount"];

/// Number of input features.
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Name of the label column in the transaction data.
pub const LABEL_COLUMN: &str = "Class";

/// A single card transaction to be scored.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    /// Seconds elapsed since the first transaction in the dataset.
    pub time: f64,
    #[serde(rename = "V1")]
    pub v1: f64,
    #[serde(rename = "V2")]
    pub v2: f64,
    #[serde(rename = "V4")]
    pub v4: f64,
    #[serde(rename = "V11")]
    pub v11: f64,
    /// Transaction amount.
    pub amount: f64,
}

impl Transaction {
    /// Returns the features in [`FEATURE_NAMES`] order.
    #[must_use]
    pub const fn features(&self) -> [f64; FEATURE_COUNT] {
        [self.time, self.v1, self.v2, self.v4, self.v11, self.amount]
    }

    /// Builds a transaction from features in [`FEATURE_NAMES`] order.
    #[must_use]
    pub const fn from_features(features: [f64; FEATURE_COUNT]) -> Self {
        let [time, v1, v2, v4, v11, amount] = features;
        Self {
            time,
            v1,
            v2,
            v4,
            v11,
            amount,
        }
    }

    /// A known legitimate transaction, used as a post-training smoke test.
    #[must_use]
    pub const fn sample() -> Self {
        Self {
            time: 0.0,
            v1: -1.359_807,
            v2: -0.072_781,
            v4: 2.536_347,
            v11: 1.175_480,
            amount: 149.62,
        }
    }
}

/// Returns the feature schema as owned strings.
#[must_use]
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(ToString::to_string).collect()
}
