//! Retrain decision over data growth since the last accepted run.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use fraud_structs::DataSnapshot;
use registry::Registry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::MonitorError;
use crate::source::DataSource;

/// Result of a retrain check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetrainCheck {
    pub should_retrain: bool,
    pub new_rows: u64,
    pub current_rows: u64,
    pub baseline_rows: u64,
    pub threshold: u64,
}

/// What happened at one point in the monitor's life.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorEventKind {
    Checked {
        current_rows: u64,
        baseline_rows: u64,
        new_rows: u64,
        threshold: u64,
        should_retrain: bool,
    },
    Unavailable {
        reason: String,
    },
    Triggered {
        reason: String,
    },
    Completed {
        run_id: Uuid,
        sample_count: u64,
    },
}

/// Timestamped monitor event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: MonitorEventKind,
}

/// Summary derived from the event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub total_retrains: usize,
    pub last_retrain: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub last_snapshot: Option<DataSnapshot>,
}

/// Watches the data source and decides whether enough new rows arrived.
///
/// The decision itself is a pure function of the current row count and
/// the last accepted run in the registry; the only state the monitor keeps
/// is an append-only event log, optionally mirrored to a JSON-lines file.
pub struct DataMonitor {
    source: Arc<dyn DataSource>,
    registry: Arc<Registry>,
    min_new_rows: u64,
    events: Mutex<Vec<MonitorEvent>>,
    log_path: Option<PathBuf>,
}

impl DataMonitor {
    /// Creates a monitor with an in-memory event log.
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>, registry: Arc<Registry>, min_new_rows: u64) -> Self {
        Self {
            source,
            registry,
            min_new_rows,
            events: Mutex::new(Vec::new()),
            log_path: None,
        }
    }

    /// Creates a monitor whose event log is persisted to `path`.
    ///
    /// Existing events in the file are loaded; unreadable lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn with_event_log(
        source: Arc<dyn DataSource>,
        registry: Arc<Registry>,
        min_new_rows: u64,
        path: impl Into<PathBuf>,
    ) -> Result<Self, MonitorError> {
        let path = path.into();
        let events = load_events(&path)?;
        debug!(path = %path.display(), events = events.len(), "Loaded monitor event log");

        Ok(Self {
            source,
            registry,
            min_new_rows,
            events: Mutex::new(events),
            log_path: Some(path),
        })
    }

    /// Returns the data source the monitor samples.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Default threshold of new rows.
    #[must_use]
    pub const fn min_new_rows(&self) -> u64 {
        self.min_new_rows
    }

    /// Decides whether enough rows arrived since the last accepted run.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::DataUnavailable`] if the source cannot be
    /// read. That means "no decision", not "no retrain".
    pub fn check(&self, threshold_override: Option<u64>) -> Result<RetrainCheck, MonitorError> {
        let threshold = threshold_override.unwrap_or(self.min_new_rows);

        let current_rows = match self.source.row_count() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Data source unavailable, skipping retrain decision");
                self.record(MonitorEventKind::Unavailable {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        let baseline_rows = self.baseline_rows()?;

        let check = decide(current_rows, baseline_rows, threshold);
        self.record(MonitorEventKind::Checked {
            current_rows,
            baseline_rows,
            new_rows: check.new_rows,
            threshold,
            should_retrain: check.should_retrain,
        });

        if check.should_retrain {
            info!(
                new_rows = check.new_rows,
                current_rows, threshold, "Retrain needed"
            );
        } else {
            debug!(
                new_rows = check.new_rows,
                current_rows, threshold, "Retrain not needed"
            );
        }

        Ok(check)
    }

    /// Row count the next retrain is measured against: the sample count of
    /// the last accepted run, or 0 if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry history cannot be read.
    pub fn baseline_rows(&self) -> Result<u64, MonitorError> {
        Ok(self
            .registry
            .last_accepted()?
            .map_or(0, |run| run.sample_count))
    }

    /// Records that an accepted run completed, advancing the baseline.
    ///
    /// Calling this again for the same run is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::UnknownRun`] if the run is not an accepted
    /// run in the registry.
    pub fn mark_completed(&self, run_id: Uuid) -> Result<(), MonitorError> {
        let already = self.lock().iter().any(|event| {
            matches!(event.kind, MonitorEventKind::Completed { run_id: id, .. } if id == run_id)
        });
        if already {
            debug!(%run_id, "Run already marked completed");
            return Ok(());
        }

        let run = self
            .registry
            .list_history()?
            .into_iter()
            .find(|run| run.run_id == run_id && run.is_accepted())
            .ok_or(MonitorError::UnknownRun(run_id))?;

        self.record(MonitorEventKind::Completed {
            run_id,
            sample_count: run.sample_count,
        });
        info!(%run_id, baseline_rows = run.sample_count, "Monitor baseline advanced");
        Ok(())
    }

    /// Notes that a retrain was started because of a check.
    pub fn record_trigger(&self, reason: &str) {
        self.record(MonitorEventKind::Triggered {
            reason: reason.to_string(),
        });
    }

    /// Past events, newest first.
    #[must_use]
    pub fn history(&self) -> Vec<MonitorEvent> {
        self.lock().iter().rev().cloned().collect()
    }

    /// Summary of checks and completed retrains.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        let mut status = MonitorStatus::default();
        for event in self.lock().iter() {
            match &event.kind {
                MonitorEventKind::Checked { current_rows, .. } => {
                    status.last_check = Some(event.at);
                    status.last_snapshot = Some(DataSnapshot {
                        row_count: *current_rows,
                        observed_at: event.at,
                    });
                }
                MonitorEventKind::Completed { .. } => {
                    status.total_retrains += 1;
                    status.last_retrain = Some(event.at);
                }
                MonitorEventKind::Unavailable { .. } | MonitorEventKind::Triggered { .. } => {}
            }
        }
        status
    }

    fn record(&self, kind: MonitorEventKind) {
        let event = MonitorEvent {
            at: Utc::now(),
            kind,
        };

        let mut events = self.lock();
        if let Some(path) = &self.log_path
            && let Err(e) = append_event(path, &event)
        {
            // The in-memory log stays authoritative for this process.
            warn!(path = %path.display(), error = %e, "Failed to persist monitor event");
        }
        events.push(event);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MonitorEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The retrain rule: at least `threshold` rows beyond the baseline.
fn decide(current_rows: u64, baseline_rows: u64, threshold: u64) -> RetrainCheck {
    let new_rows = current_rows.saturating_sub(baseline_rows);
    RetrainCheck {
        should_retrain: new_rows >= threshold,
        new_rows,
        current_rows,
        baseline_rows,
        threshold,
    }
}

fn append_event(path: &Path, event: &MonitorEvent) -> Result<(), MonitorError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_vec(event).map_err(std::io::Error::from)?;
    line.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    Ok(())
}

fn load_events(path: &Path) -> Result<Vec<MonitorEvent>, MonitorError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut events = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        match serde_json::from_str(&line) {
            Ok(event) => events.push(event),
            Err(e) if !line.trim().is_empty() => {
                warn!(error = %e, "Skipping unreadable monitor event");
            }
            Err(_) => {}
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use fraud_model::Dataset;
    use fraud_structs::{RunDecision, TrainingRun, feature_names};

    use super::*;

    /// Row counts set directly by the test.
    struct FakeSource {
        rows: AtomicU64,
        available: bool,
    }

    impl FakeSource {
        fn new(rows: u64) -> Arc<Self> {
            Arc::new(Self {
                rows: AtomicU64::new(rows),
                available: true,
            })
        }
    }

    impl DataSource for FakeSource {
        fn row_count(&self) -> Result<u64, MonitorError> {
            if self.available {
                Ok(self.rows.load(Ordering::SeqCst))
            } else {
                Err(MonitorError::DataUnavailable(String::from("offline")))
            }
        }

        fn load(&self) -> Result<Dataset, MonitorError> {
            Ok(Dataset::new())
        }
    }

    fn run(decision: RunDecision, sample_count: u64) -> TrainingRun {
        TrainingRun {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            sample_count,
            feature_names: feature_names(),
            cv_auc: 0.9,
            test_auc: 0.9,
            decision,
            baseline_test_auc: None,
            version: None,
            reason: String::from("test"),
            error: None,
        }
    }

    fn registry() -> (tempfile::TempDir, Arc<Registry>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Arc::new(Registry::open(dir.path()).expect("open registry"));
        (dir, registry)
    }

    #[test]
    fn test_threshold_examples() {
        let (_dir, registry) = registry();
        registry
            .append_run(&run(RunDecision::Accepted, 8000))
            .expect("append");

        let source = FakeSource::new(8105);
        let monitor = DataMonitor::new(source.clone(), registry, 100);

        let check = monitor.check(None).expect("check");
        assert!(check.should_retrain);
        assert_eq!(check.new_rows, 105);
        assert_eq!(check.baseline_rows, 8000);

        source.rows.store(8099, Ordering::SeqCst);
        let check = monitor.check(None).expect("check");
        assert!(!check.should_retrain);
        assert_eq!(check.new_rows, 99);
    }

    #[test]
    fn test_exact_threshold_triggers() {
        let check = decide(8100, 8000, 100);
        assert!(check.should_retrain);
    }

    #[test]
    fn test_threshold_override() {
        let (_dir, registry) = registry();
        let monitor = DataMonitor::new(FakeSource::new(50), registry, 100);

        assert!(!monitor.check(None).expect("check").should_retrain);
        assert!(monitor.check(Some(50)).expect("check").should_retrain);
    }

    #[test]
    fn test_baseline_ignores_rejected_runs() {
        let (_dir, registry) = registry();
        registry
            .append_run(&run(RunDecision::Accepted, 1000))
            .expect("append");
        registry
            .append_run(&run(RunDecision::RejectedLowAuc, 5000))
            .expect("append");

        let monitor = DataMonitor::new(FakeSource::new(5050), registry, 100);
        let check = monitor.check(None).expect("check");
        assert_eq!(check.baseline_rows, 1000);
        assert!(check.should_retrain);
    }

    #[test]
    fn test_shrinking_data_saturates() {
        let check = decide(10, 500, 100);
        assert_eq!(check.new_rows, 0);
        assert!(!check.should_retrain);
    }

    #[test]
    fn test_unavailable_source_makes_no_decision() {
        let (_dir, registry) = registry();
        let source = Arc::new(FakeSource {
            rows: AtomicU64::new(1_000_000),
            available: false,
        });
        let monitor = DataMonitor::new(source, registry, 1);

        assert!(matches!(
            monitor.check(None),
            Err(MonitorError::DataUnavailable(_))
        ));
        assert!(matches!(
            monitor.history().first().map(|e| &e.kind),
            Some(MonitorEventKind::Unavailable { .. })
        ));
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let (_dir, registry) = registry();
        let accepted = run(RunDecision::Accepted, 700);
        registry.append_run(&accepted).expect("append");

        let monitor = DataMonitor::new(FakeSource::new(700), registry, 100);
        monitor.mark_completed(accepted.run_id).expect("first");
        monitor.mark_completed(accepted.run_id).expect("second");

        let status = monitor.status();
        assert_eq!(status.total_retrains, 1);
        assert!(status.last_retrain.is_some());
    }

    #[test]
    fn test_mark_completed_rejects_unknown_and_rejected_runs() {
        let (_dir, registry) = registry();
        let rejected = run(RunDecision::RejectedDegraded, 700);
        registry.append_run(&rejected).expect("append");

        let monitor = DataMonitor::new(FakeSource::new(700), registry, 100);
        assert!(matches!(
            monitor.mark_completed(rejected.run_id),
            Err(MonitorError::UnknownRun(_))
        ));
        assert!(matches!(
            monitor.mark_completed(Uuid::new_v4()),
            Err(MonitorError::UnknownRun(_))
        ));
    }

    #[test]
    fn test_history_is_newest_first() {
        let (_dir, registry) = registry();
        let monitor = DataMonitor::new(FakeSource::new(10), registry, 100);

        monitor.check(None).expect("check");
        monitor.record_trigger("manual");

        let history = monitor.history();
        assert_eq!(history.len(), 2);
        assert!(matches!(history[0].kind, MonitorEventKind::Triggered { .. }));
        assert!(matches!(history[1].kind, MonitorEventKind::Checked { .. }));
        assert_eq!(monitor.status().last_snapshot.map(|s| s.row_count), Some(10));
    }

    #[test]
    fn test_event_log_survives_restart() {
        let (dir, registry) = registry();
        let path = dir.path().join("monitor.jsonl");

        {
            let monitor = DataMonitor::with_event_log(
                FakeSource::new(42),
                Arc::clone(&registry),
                100,
                &path,
            )
            .expect("monitor");
            monitor.check(None).expect("check");
        }

        let monitor =
            DataMonitor::with_event_log(FakeSource::new(42), registry, 100, &path).expect("reload");
        assert_eq!(monitor.history().len(), 1);
        assert!(monitor.status().last_check.is_some());
    }
}
