//! Watch command - scheduled monitor, retrain and hot reload until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use data_monitor::spawn_watcher;
use hot_reload::ReloadError;
use orchestrator::{CancelToken, RetrainError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{App, deploy};

/// Runs the lifecycle loop until interrupted.
///
/// Each tick checks the data, retrains when due and deploys accepted
/// candidates. Training runs on the blocking pool so the loop stays
/// responsive. A tick also reloads the coordinator, which picks up
/// versions activated by another process.
///
/// # Errors
///
/// Returns an error if the shutdown signal cannot be installed or the
/// watcher task panics.
pub async fn run(app: Arc<App>) -> Result<()> {
    match app.coordinator.reload() {
        Ok(outcome) => info!(version = outcome.new_version, "Serving model"),
        Err(ReloadError::NoActiveModel) => warn!("No model committed yet, waiting for a retrain"),
        Err(e) => error!(error = %e, "Failed to load the active model"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cancel = CancelToken::new();

    let watcher = if app.config.enable_model_watcher {
        let app = Arc::clone(&app);
        let cancel = cancel.clone();
        Some(spawn_watcher(app.config.watcher_interval, shutdown_rx, move || {
            tick(Arc::clone(&app), cancel.clone())
        }))
    } else {
        info!("Model watcher disabled, serving the current model only");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    cancel.cancel();
    // The watcher may already have stopped on its own.
    let _ = shutdown_tx.send(true);
    if let Some(watcher) = watcher {
        watcher.await.context("Watcher task panicked")?;
    }

    Ok(())
}

/// One scheduled pass: check, maybe retrain, deploy.
async fn tick(app: Arc<App>, cancel: CancelToken) {
    let orchestrator = Arc::clone(&app.orchestrator);
    let result =
        tokio::task::spawn_blocking(move || orchestrator.check_and_run(None, false, &cancel))
            .await;

    match result {
        Ok(Ok(Some(run))) if run.is_accepted() => {
            info!(version = run.version, test_auc = run.test_auc, "New model committed");
        }
        Ok(Ok(Some(run))) => {
            info!(
                decision = %run.decision,
                error = run.error.as_deref(),
                "Candidate not deployed"
            );
        }
        Ok(Ok(None)) => {}
        Ok(Err(RetrainError::RetrainInProgress)) => debug!("Retrain already running"),
        Ok(Err(e)) => warn!(error = %e, "Scheduled retrain failed"),
        Err(e) => error!(error = %e, "Retrain task panicked"),
    }

    match deploy::notify_reload(Arc::clone(&app.coordinator), app.config.reload_timeout).await {
        Ok(_) => {}
        Err(e)
            if matches!(
                e.downcast_ref::<ReloadError>(),
                Some(ReloadError::NoActiveModel)
            ) => {}
        Err(e) => error!(error = %e, "Failed to deploy the active model"),
    }
}
