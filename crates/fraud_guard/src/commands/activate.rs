//! Activate command - points the registry at a retained version.

use anyhow::{Context, Result};
use tracing::info;

use crate::App;

/// Makes `version` active. Used for rollback and roll-forward.
///
/// # Errors
///
/// Returns an error if the version is not retained in the registry.
pub fn run(app: &App, version: u64) -> Result<()> {
    let previous = app
        .registry
        .active_version()
        .context("Failed to read active version")?;

    app.registry
        .set_active(version)
        .with_context(|| format!("Failed to activate v{version}"))?;

    info!(previous, version, "Activated model version");
    println!("active version: v{version}");
    Ok(())
}
