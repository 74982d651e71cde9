//! History command - prints the run log or the monitor's event log.

use anyhow::{Context, Result};

use super::print_json;
use crate::App;

/// Prints recorded runs (or monitor events), newest first.
///
/// # Errors
///
/// Returns an error if the run log cannot be read.
pub fn run(app: &App, limit: Option<usize>, events: bool) -> Result<()> {
    let limit = limit.unwrap_or(usize::MAX);

    if events {
        let events: Vec<_> = app.monitor.history().into_iter().take(limit).collect();
        return print_json(&events);
    }

    let runs: Vec<_> = app
        .registry
        .list_history()
        .context("Failed to read run history")?
        .into_iter()
        .take(limit)
        .collect();
    print_json(&runs)
}
