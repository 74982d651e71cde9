//! Zero-downtime swapping of the served fraud model.
//!
//! Readers clone an `Arc` to the current [`ActiveModelHandle`] and score
//! against it without holding any lock. A reload builds the replacement
//! handle completely before taking the write lock for the pointer swap.

mod coordinator;
mod error;
mod info;

pub use coordinator::{ActiveModelHandle, HotReloadCoordinator, ReloadOutcome};
pub use error::ReloadError;
pub use info::{BatchPrediction, BatchSummary, ModelInfo, ModelStatus, Prediction};
