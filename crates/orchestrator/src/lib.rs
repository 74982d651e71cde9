//! Retrain orchestration: train a candidate, gate it, commit it.
//!
//! A run moves through `Pending → Training → Validating → {Accepted |
//! Rejected}` and, when accepted, `Committing → Deployed`. Rejections are
//! recorded decisions, not errors; [`RetrainError`] is reserved for the
//! cases where no run could be recorded at all.

mod cancel;
mod checks;
mod error;
pub mod gates;
mod orchestrator;

pub use cancel::CancelToken;
pub use checks::{PostTrainCheck, SampleTransactionCheck};
pub use error::RetrainError;
pub use orchestrator::RetrainOrchestrator;
