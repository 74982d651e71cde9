//! Synthetic transaction generator for local development.
//!
//! Legitimate and fraudulent rows are drawn from different per-feature
//! distributions so a classifier has real signal to learn.

use fraud_structs::FEATURE_COUNT;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};

use crate::dataset::Dataset;

/// Seconds in the two-day window the source data covers.
const TIME_WINDOW_SECONDS: f64 = 172_800.0;

/// Fraud rate of the public card-transaction dataset.
pub const REAL_WORLD_FRAUD_RATE: f64 = 0.0017;

/// Fraud rate for development data. A 1000-row batch still leaves a few
/// fraud rows in every cross-validation fold and in the test split.
pub const DEFAULT_FRAUD_RATE: f64 = 0.02;

/// Generates `rows` labelled transactions with roughly `fraud_rate` fraud.
///
/// At least one fraud row is produced whenever `rows > 1` so the result
/// is always trainable.
#[must_use]
pub fn generate(rows: usize, fraud_rate: f64, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Dataset::new();

    let n_fraud = ((rows as f64 * fraud_rate.clamp(0.0, 1.0)).round() as usize)
        .max(usize::from(rows > 1))
        .min(rows);

    for i in 0..rows {
        let fraud = i < n_fraud;
        data.push(sample_row(&mut rng, fraud), fraud);
    }

    // Interleave fraud rows instead of leaving them all at the top.
    let mut order: Vec<usize> = (0..rows).collect();
    rand::seq::SliceRandom::shuffle(order.as_mut_slice(), &mut rng);
    data.subset(&order)
}

fn sample_row(rng: &mut StdRng, fraud: bool) -> [f64; FEATURE_COUNT] {
    let time = rng.random_range(0.0..TIME_WINDOW_SECONDS);
    if fraud {
        [
            time,
            normal(rng, -3.0, 1.0),
            normal(rng, 1.5, 1.5),
            normal(rng, 3.0, 1.5),
            normal(rng, 3.0, 1.5),
            log_normal(rng, 4.5, 1.5),
        ]
    } else {
        [
            time,
            normal(rng, -0.5, 2.0),
            normal(rng, 0.0, 1.5),
            normal(rng, 0.0, 1.8),
            normal(rng, 0.0, 2.2),
            log_normal(rng, 3.0, 2.0),
        ]
    }
}

// Parameters below are constants with positive spread, so the
// distribution constructors only fail on programmer error; fall back to
// the location parameter in that case.
fn normal(rng: &mut StdRng, mean: f64, sd: f64) -> f64 {
    Normal::new(mean, sd).map_or(mean, |d| d.sample(rng))
}

fn log_normal(rng: &mut StdRng, mu: f64, sigma: f64) -> f64 {
    LogNormal::new(mu, sigma).map_or_else(|_| mu.exp(), |d| d.sample(rng))
}
