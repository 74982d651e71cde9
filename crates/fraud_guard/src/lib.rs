//! Fraud model lifecycle service
//!
//! Keeps a fraud classifier fresh as transaction data grows: decides when
//! to retrain, gates candidates on quality, commits them to a versioned
//! registry and hot-swaps the served model.

pub mod app;
pub mod commands;
pub mod deploy;

pub use app::App;
