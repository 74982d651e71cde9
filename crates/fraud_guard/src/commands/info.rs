//! Info command - loads the active model and reports its health.

use anyhow::Result;
use hot_reload::{ModelInfo, ReloadError};
use tracing::warn;

use super::print_json;
use crate::App;

/// Loads the active model, if any, and prints the health/info record.
///
/// # Errors
///
/// Returns an error if the active model exists but cannot be loaded.
pub fn run(app: &App) -> Result<ModelInfo> {
    match app.coordinator.reload() {
        Ok(_) => {}
        Err(ReloadError::NoActiveModel) => warn!("No model has been committed yet"),
        Err(e) => return Err(e.into()),
    }

    let info = app.coordinator.info();
    print_json(&info)?;
    Ok(info)
}
