//! CLI command implementations.

pub mod activate;
pub mod check;
pub mod history;
pub mod info;
pub mod predict;
pub mod retrain;
pub mod synth;
pub mod watch;

use anyhow::{Context, Result};
use serde::Serialize;

/// Prints `value` as pretty JSON on stdout.
fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
