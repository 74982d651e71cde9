//! Deploy notifier: tells the coordinator to pick up a newly committed model.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backon::{ExponentialBuilder, Retryable};
use hot_reload::{HotReloadCoordinator, ReloadError, ReloadOutcome};
use tracing::{info, warn};

/// Reloads the coordinator, retrying with backoff until it succeeds or
/// `timeout` elapses.
///
/// Reload is idempotent, so delivering the notification more than once is
/// harmless. A registry without an active model is not retried.
///
/// # Errors
///
/// Returns an error if every attempt failed or the timeout elapsed.
pub async fn notify_reload(
    coordinator: Arc<HotReloadCoordinator>,
    timeout: Duration,
) -> Result<ReloadOutcome> {
    let attempt = || {
        let coordinator = Arc::clone(&coordinator);
        async move {
            tokio::task::spawn_blocking(move || coordinator.reload())
                .await
                .context("Reload task panicked")?
                .map_err(anyhow::Error::from)
        }
    };

    let retried = attempt
        .retry(
            ExponentialBuilder::default()
                .with_max_times(5)
                .with_min_delay(Duration::from_millis(200))
                .with_max_delay(Duration::from_secs(5)),
        )
        .when(|e| {
            !matches!(
                e.downcast_ref::<ReloadError>(),
                Some(ReloadError::NoActiveModel)
            )
        })
        .notify(|e, delay| warn!(error = %e, ?delay, "Reload failed, retrying"));

    let outcome = tokio::time::timeout(timeout, retried)
        .await
        .with_context(|| format!("Reload did not complete within {timeout:?}"))??;

    if outcome.swapped() {
        info!(
            previous_version = outcome.previous_version,
            new_version = outcome.new_version,
            "Deployed model"
        );
    }
    Ok(outcome)
}
