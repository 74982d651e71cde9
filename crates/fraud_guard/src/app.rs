//! Wiring of the lifecycle components from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use config::Config;
use data_monitor::{CsvDataSource, DataMonitor, DataSource};
use fraud_model::LogisticBackend;
use hot_reload::HotReloadCoordinator;
use orchestrator::RetrainOrchestrator;
use registry::Registry;
use tracing::debug;

/// File in the logs directory that persists monitor events.
const MONITOR_EVENTS_FILE: &str = "monitor-events.jsonl";

/// The registry, monitor, orchestrator and coordinator for one process.
pub struct App {
    pub config: Config,
    pub registry: Arc<Registry>,
    pub monitor: Arc<DataMonitor>,
    pub orchestrator: Arc<RetrainOrchestrator>,
    pub coordinator: Arc<HotReloadCoordinator>,
}

impl App {
    /// Opens the registry and builds every component on top of it.
    ///
    /// Nothing is loaded into the coordinator yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry or the monitor event log cannot be
    /// opened.
    pub fn open(config: Config) -> Result<Self> {
        let registry = Arc::new(
            Registry::open(&config.model_dir).with_context(|| {
                format!("Failed to open model registry at {}", config.model_dir.display())
            })?,
        );

        let source: Arc<dyn DataSource> = Arc::new(CsvDataSource::new(&config.data_path));
        let events_path = config.logs_dir.join(MONITOR_EVENTS_FILE);
        let monitor = Arc::new(
            DataMonitor::with_event_log(
                source,
                Arc::clone(&registry),
                config.policy.min_new_rows,
                &events_path,
            )
            .with_context(|| format!("Failed to open {}", events_path.display()))?,
        );

        let orchestrator = Arc::new(RetrainOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&monitor),
            Arc::new(LogisticBackend::default()),
            config.policy.clone(),
        ));
        let coordinator = Arc::new(HotReloadCoordinator::new(Arc::clone(&registry)));

        debug!(
            model_dir = %config.model_dir.display(),
            data_path = %config.data_path.display(),
            "Lifecycle components ready"
        );

        Ok(Self {
            config,
            registry,
            monitor,
            orchestrator,
            coordinator,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use super::*;

    /// Configuration rooted in `dir`, with a low retrain threshold.
    pub(crate) fn test_config(dir: &Path) -> Config {
        let vars: HashMap<&str, String> = HashMap::from([
            ("DATA_PATH", dir.join("data.csv").display().to_string()),
            ("MODEL_DIR", dir.join("models").display().to_string()),
            ("LOGS_DIR", dir.join("logs").display().to_string()),
            ("MIN_NEW_ROWS", String::from("50")),
            ("MIN_TEST_AUC", String::from("0.6")),
            ("RELOAD_TIMEOUT_SECS", String::from("5")),
        ]);
        Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
    }

    #[test]
    fn test_open_creates_empty_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = App::open(test_config(dir.path())).expect("open app");

        assert!(app.registry.versions().expect("versions").is_empty());
        assert!(app.coordinator.current().is_none());
        assert_eq!(app.monitor.min_new_rows(), 50);
        assert!(dir.path().join("models").is_dir());
    }
}
