use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{TimeDelta, Utc};
use data_monitor::DataMonitor;
use fraud_model::{Dataset, TrainingBackend};
use fraud_structs::{RetrainPolicy, RunDecision, RunState, TrainingRun, feature_names};
use registry::{Registry, RegistryError, RunLease};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::checks::{PostTrainCheck, SampleTransactionCheck};
use crate::error::{RetrainError, RunFailure};
use crate::gates;

/// Runs retrains one at a time and commits accepted candidates.
pub struct RetrainOrchestrator {
    registry: Arc<Registry>,
    monitor: Arc<DataMonitor>,
    backend: Arc<dyn TrainingBackend>,
    policy: RetrainPolicy,
    post_train_check: Arc<dyn PostTrainCheck>,
    running: AtomicBool,
}

/// Clears the in-process running flag on drop.
struct RunFlag<'a>(&'a AtomicBool);

impl Drop for RunFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Holds the single-run token for this process and the registry's run
/// lease for every process sharing the registry root. Released on drop.
struct RunToken<'a> {
    _lease: RunLease,
    _flag: RunFlag<'a>,
}

impl RetrainOrchestrator {
    /// Creates an orchestrator using the sample-transaction smoke test.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        monitor: Arc<DataMonitor>,
        backend: Arc<dyn TrainingBackend>,
        policy: RetrainPolicy,
    ) -> Self {
        Self {
            registry,
            monitor,
            backend,
            policy,
            post_train_check: Arc::new(SampleTransactionCheck),
            running: AtomicBool::new(false),
        }
    }

    /// Replaces the post-train check.
    #[must_use]
    pub fn with_post_train_check(mut self, check: Arc<dyn PostTrainCheck>) -> Self {
        self.post_train_check = check;
        self
    }

    /// Returns true while a run holds the single-run token.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Checks the monitor and runs a retrain when needed or when `force`d.
    ///
    /// A retrain is needed when enough new rows arrived, when the active
    /// model is older than the policy's maximum age, or when its held-out
    /// AUC is below the policy minimum. Returns `None` when none of these
    /// hold.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be made or the run cannot be
    /// recorded. See [`RetrainOrchestrator::run`].
    pub fn check_and_run(
        &self,
        threshold_override: Option<u64>,
        force: bool,
        cancel: &CancelToken,
    ) -> Result<Option<TrainingRun>, RetrainError> {
        let reason = if force {
            String::from("forced")
        } else {
            let check = self.monitor.check(threshold_override)?;
            if check.should_retrain {
                format!(
                    "{} new rows (threshold {})",
                    check.new_rows, check.threshold
                )
            } else if let Some(reason) = self.staleness_reason()? {
                info!(reason = %reason, "Active model is stale");
                reason
            } else {
                return Ok(None);
            }
        };

        let token = self.acquire()?;
        self.monitor.record_trigger(&reason);
        self.run_with(token, &reason, cancel).map(Some)
    }

    /// Why the active model should be replaced even without new data.
    fn staleness_reason(&self) -> Result<Option<String>, RetrainError> {
        let active = match self.registry.get_active() {
            Ok(artifact) => artifact,
            Err(RegistryError::NoActiveModel) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if let Some(max_days) = self.policy.max_model_age_days {
            let age = Utc::now() - active.metadata.finished_at;
            let max_age = i64::try_from(max_days)
                .ok()
                .and_then(TimeDelta::try_days)
                .unwrap_or(TimeDelta::MAX);
            if age > max_age {
                return Ok(Some(format!(
                    "model v{} is {} days old (max {max_days})",
                    active.version,
                    age.num_days()
                )));
            }
        }

        if active.test_auc() < self.policy.min_test_auc {
            return Ok(Some(format!(
                "model v{} test AUC {:.4} below {:.4}",
                active.version,
                active.test_auc(),
                self.policy.min_test_auc
            )));
        }

        Ok(None)
    }

    /// Trains, gates and, if accepted, commits a new model version.
    ///
    /// The returned run is already in the run log. Rejections, training
    /// failures, storage failures during commit and cancellation are all
    /// reported through the run's decision rather than as errors.
    ///
    /// # Errors
    ///
    /// - [`RetrainError::RetrainInProgress`] if another run is active in
    ///   this process or in any process sharing the registry.
    /// - [`RetrainError::DataUnavailable`] if the data cannot be loaded.
    /// - [`RetrainError::Registry`] if the run log cannot be written.
    pub fn run(&self, reason: &str, cancel: &CancelToken) -> Result<TrainingRun, RetrainError> {
        let token = self.acquire()?;
        self.run_with(token, reason, cancel)
    }

    fn run_with(
        &self,
        _token: RunToken<'_>,
        reason: &str,
        cancel: &CancelToken,
    ) -> Result<TrainingRun, RetrainError> {
        let run_id = Uuid::new_v4();
        let mut state = RunState::Pending;
        info!(%run_id, reason, "Retrain run started");

        let data = self.monitor.source().load()?;

        let mut run = TrainingRun {
            run_id,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            sample_count: data.len() as u64,
            feature_names: feature_names(),
            cv_auc: 0.0,
            test_auc: 0.0,
            decision: RunDecision::RejectedError,
            baseline_test_auc: None,
            version: None,
            reason: reason.to_string(),
            error: None,
        };

        if let Err(failure) = self.execute(&data, &mut run, &mut state, cancel) {
            error!(%run_id, state = ?state, error = %failure, "Retrain run failed");
            if !state.is_terminal() {
                advance(run_id, &mut state, RunState::Rejected);
            }
            run.decision = RunDecision::RejectedError;
            run.version = None;
            run.error = Some(failure.to_string());
        }
        run.finished_at = Utc::now();

        self.registry.append_run(&run)?;

        if run.is_accepted()
            && let Err(e) = self.monitor.mark_completed(run_id)
        {
            warn!(%run_id, error = %e, "Failed to advance monitor baseline");
        }

        info!(
            %run_id,
            decision = %run.decision,
            version = run.version,
            test_auc = run.test_auc,
            baseline_test_auc = run.baseline_test_auc,
            "Retrain run finished"
        );
        Ok(run)
    }

    fn acquire(&self) -> Result<RunToken<'_>, RetrainError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RetrainError::RetrainInProgress)?;
        let flag = RunFlag(&self.running);

        let lease = self.registry.try_lease_run()?.ok_or_else(|| {
            debug!("Run lease held by another process");
            RetrainError::RetrainInProgress
        })?;

        Ok(RunToken {
            _lease: lease,
            _flag: flag,
        })
    }

    fn execute(
        &self,
        data: &Dataset,
        run: &mut TrainingRun,
        state: &mut RunState,
        cancel: &CancelToken,
    ) -> Result<(), RunFailure> {
        advance(run.run_id, state, RunState::Training);
        let candidate = self.backend.train(data)?;
        run.cv_auc = candidate.cv_auc;
        run.test_auc = candidate.test_auc;
        run.sample_count = candidate.sample_count;
        run.feature_names.clone_from(&candidate.feature_names);

        advance(run.run_id, state, RunState::Validating);
        let incumbent = match self.registry.get_active() {
            Ok(artifact) => Some(artifact),
            Err(RegistryError::NoActiveModel) => None,
            Err(e) => return Err(e.into()),
        };
        run.baseline_test_auc = incumbent.as_ref().map(|a| a.test_auc());

        let decision = gates::evaluate(&self.policy, candidate.test_auc, run.baseline_test_auc);
        if !decision.is_accepted() {
            run.decision = decision;
            advance(run.run_id, state, RunState::Rejected);
            return Ok(());
        }

        if self.policy.run_post_train_checks {
            let check = &self.post_train_check;
            check
                .verify(&candidate.model)
                .map_err(|reason| RunFailure::PostTrainCheck {
                    check: check.name().to_string(),
                    reason,
                })?;
            debug!(run_id = %run.run_id, check = check.name(), "Post-train check passed");
        }
        advance(run.run_id, state, RunState::Accepted);

        if cancel.is_cancelled() {
            return Err(RunFailure::Cancelled);
        }

        // Past this point the run is not interruptible.
        advance(run.run_id, state, RunState::Committing);
        let bytes = candidate.model.to_bytes()?;
        run.decision = RunDecision::Accepted;
        let artifact = self.registry.put(&bytes, run)?;
        self.registry.set_active(artifact.version)?;
        run.version = Some(artifact.version);

        let retention = if self.policy.backup_enabled {
            self.policy.backup_retention
        } else {
            0
        };
        if let Err(e) = self.registry.prune(retention) {
            warn!(error = %e, "Failed to prune superseded model versions");
        }

        advance(run.run_id, state, RunState::Deployed);
        info!(
            version = artifact.version,
            test_auc = run.test_auc,
            previous = incumbent.map(|a| a.version),
            "Committed candidate"
        );
        Ok(())
    }
}

fn advance(run_id: Uuid, state: &mut RunState, next: RunState) {
    debug_assert!(state.can_advance_to(next), "{state:?} -> {next:?}");
    info!(%run_id, from = ?state, to = ?next, "Run state changed");
    *state = next;
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Mutex, OnceLock};
    use std::thread;

    use chrono::DateTime;
    use data_monitor::{DataSource, MonitorError, MonitorEventKind};
    use fraud_structs::ModelArtifact;
    use fraud_model::{
        FraudClassifier, TrainedCandidate, TrainingConfig, TrainingError, fit, synthetic,
    };

    use super::*;

    fn tiny_model() -> FraudClassifier {
        static MODEL: OnceLock<FraudClassifier> = OnceLock::new();
        MODEL
            .get_or_init(|| {
                let config = TrainingConfig {
                    epochs: 20,
                    ..TrainingConfig::default()
                };
                fit(&synthetic::generate(200, 0.2, 5), &config).expect("fit")
            })
            .clone()
    }

    struct FixedSource {
        rows: usize,
    }

    impl DataSource for FixedSource {
        fn row_count(&self) -> Result<u64, MonitorError> {
            Ok(self.rows as u64)
        }

        fn load(&self) -> Result<Dataset, MonitorError> {
            Ok(synthetic::generate(self.rows, 0.2, 1))
        }
    }

    struct MissingSource;

    impl DataSource for MissingSource {
        fn row_count(&self) -> Result<u64, MonitorError> {
            Err(MonitorError::DataUnavailable(String::from("gone")))
        }

        fn load(&self) -> Result<Dataset, MonitorError> {
            Err(MonitorError::DataUnavailable(String::from("gone")))
        }
    }

    /// Reports whatever test AUC it was last told to.
    struct ScriptedBackend {
        test_auc: Mutex<f64>,
    }

    impl ScriptedBackend {
        fn new(test_auc: f64) -> Arc<Self> {
            Arc::new(Self {
                test_auc: Mutex::new(test_auc),
            })
        }

        fn set(&self, test_auc: f64) {
            *self.test_auc.lock().expect("lock") = test_auc;
        }
    }

    impl TrainingBackend for ScriptedBackend {
        fn train(&self, data: &Dataset) -> Result<TrainedCandidate, TrainingError> {
            let test_auc = *self.test_auc.lock().expect("lock");
            Ok(TrainedCandidate {
                model: tiny_model(),
                cv_auc: test_auc,
                test_auc,
                sample_count: data.len() as u64,
                feature_names: feature_names(),
            })
        }
    }

    struct FailingBackend;

    impl TrainingBackend for FailingBackend {
        fn train(&self, _data: &Dataset) -> Result<TrainedCandidate, TrainingError> {
            Err(TrainingError::EmptyDataset)
        }
    }

    /// Signals when training starts, then waits to be released.
    struct BlockingBackend {
        started: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl TrainingBackend for BlockingBackend {
        fn train(&self, data: &Dataset) -> Result<TrainedCandidate, TrainingError> {
            self.started.lock().expect("lock").send(()).expect("signal start");
            self.release.lock().expect("lock").recv().expect("wait for release");
            ScriptedBackend::new(0.95).train(data)
        }
    }

    struct RejectingCheck;

    impl PostTrainCheck for RejectingCheck {
        fn name(&self) -> &str {
            "always_fails"
        }

        fn verify(&self, _model: &FraudClassifier) -> Result<(), String> {
            Err(String::from("nope"))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        registry: Arc<Registry>,
        monitor: Arc<DataMonitor>,
    }

    impl Fixture {
        fn models(&self) -> std::path::PathBuf {
            self.dir.path().join("models")
        }

        /// A second process's view of the same registry root.
        fn sibling(&self) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let registry = Arc::new(Registry::open(self.models()).expect("registry"));
            let monitor = Arc::new(DataMonitor::new(
                Arc::new(FixedSource { rows: 400 }),
                Arc::clone(&registry),
                100,
            ));
            Self {
                dir,
                registry,
                monitor,
            }
        }

        /// Commits and activates a model outside any run.
        fn activate(&self, test_auc: f64, finished_at: DateTime<Utc>) -> ModelArtifact {
            let run = TrainingRun {
                run_id: Uuid::new_v4(),
                started_at: finished_at,
                finished_at,
                sample_count: 400,
                feature_names: feature_names(),
                cv_auc: test_auc,
                test_auc,
                decision: RunDecision::Accepted,
                baseline_test_auc: None,
                version: None,
                reason: String::from("seed"),
                error: None,
            };
            let bytes = tiny_model().to_bytes().expect("serialize");
            let artifact = self.registry.put(&bytes, &run).expect("put");
            self.registry.set_active(artifact.version).expect("activate");
            artifact
        }
    }

    fn fixture_with(source: Arc<dyn DataSource>) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Arc::new(Registry::open(dir.path().join("models")).expect("registry"));
        let monitor = Arc::new(DataMonitor::new(source, Arc::clone(&registry), 100));
        Fixture {
            dir,
            registry,
            monitor,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(FixedSource { rows: 400 }))
    }

    fn orchestrator(
        fixture: &Fixture,
        backend: Arc<dyn TrainingBackend>,
        policy: RetrainPolicy,
    ) -> RetrainOrchestrator {
        RetrainOrchestrator::new(
            Arc::clone(&fixture.registry),
            Arc::clone(&fixture.monitor),
            backend,
            policy,
        )
    }

    #[test]
    fn test_first_run_is_committed_and_activated() {
        let fixture = fixture();
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());

        let run = orchestrator
            .run("manual", &CancelToken::new())
            .expect("run");

        assert_eq!(run.decision, RunDecision::Accepted);
        assert_eq!(run.version, Some(1));
        assert_eq!(run.baseline_test_auc, None);
        assert_eq!(run.sample_count, 400);
        assert_eq!(fixture.registry.get_active().expect("active").version, 1);
        assert_eq!(fixture.registry.list_history().expect("history").len(), 1);
        assert_eq!(fixture.monitor.status().total_retrains, 1);
        assert_eq!(fixture.monitor.baseline_rows().expect("baseline"), 400);
    }

    #[test]
    fn test_low_auc_leaves_registry_unchanged() {
        let fixture = fixture();
        let backend = ScriptedBackend::new(0.95);
        let orchestrator = orchestrator(&fixture, backend.clone(), RetrainPolicy::default());
        orchestrator.run("seed", &CancelToken::new()).expect("seed");

        backend.set(0.80);
        let run = orchestrator.run("manual", &CancelToken::new()).expect("run");

        assert_eq!(run.decision, RunDecision::RejectedLowAuc);
        assert_eq!(run.version, None);
        assert_eq!(fixture.registry.get_active().expect("active").version, 1);
        assert_eq!(fixture.registry.versions().expect("versions"), vec![1]);
        assert_eq!(fixture.registry.list_history().expect("history").len(), 2);
        assert_eq!(fixture.monitor.status().total_retrains, 1);
    }

    #[test]
    fn test_degradation_gate_uses_incumbent() {
        let fixture = fixture();
        let backend = ScriptedBackend::new(0.99);
        let policy = RetrainPolicy {
            max_degradation: 0.05,
            ..RetrainPolicy::default()
        };
        let orchestrator = orchestrator(&fixture, backend.clone(), policy);
        orchestrator.run("seed", &CancelToken::new()).expect("seed");

        backend.set(0.93);
        let degraded = orchestrator.run("manual", &CancelToken::new()).expect("run");
        assert_eq!(degraded.decision, RunDecision::RejectedDegraded);
        assert_eq!(degraded.baseline_test_auc, Some(0.99));

        backend.set(0.95);
        let accepted = orchestrator.run("manual", &CancelToken::new()).expect("run");
        assert_eq!(accepted.decision, RunDecision::Accepted);
        assert_eq!(accepted.version, Some(2));
    }

    #[test]
    fn test_backend_error_becomes_rejected_run() {
        let fixture = fixture();
        let orchestrator =
            orchestrator(&fixture, Arc::new(FailingBackend), RetrainPolicy::default());

        let run = orchestrator.run("manual", &CancelToken::new()).expect("run");
        assert_eq!(run.decision, RunDecision::RejectedError);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("training failed")));
        assert!(fixture.registry.versions().expect("versions").is_empty());
        assert!(!orchestrator.is_running());
    }

    #[test]
    fn test_failed_post_train_check_blocks_commit() {
        let fixture = fixture();
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default())
                .with_post_train_check(Arc::new(RejectingCheck));

        let run = orchestrator.run("manual", &CancelToken::new()).expect("run");
        assert_eq!(run.decision, RunDecision::RejectedError);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("always_fails")));
        assert!(fixture.registry.get_active().is_err());
    }

    #[test]
    fn test_post_train_check_can_be_disabled() {
        let fixture = fixture();
        let policy = RetrainPolicy {
            run_post_train_checks: false,
            ..RetrainPolicy::default()
        };
        let orchestrator = orchestrator(&fixture, ScriptedBackend::new(0.95), policy)
            .with_post_train_check(Arc::new(RejectingCheck));

        let run = orchestrator.run("manual", &CancelToken::new()).expect("run");
        assert_eq!(run.decision, RunDecision::Accepted);
    }

    #[test]
    fn test_cancel_before_commit_commits_nothing() {
        let fixture = fixture();
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());
        let cancel = CancelToken::new();
        cancel.cancel();

        let run = orchestrator.run("manual", &cancel).expect("run");
        assert_eq!(run.decision, RunDecision::RejectedError);
        assert_eq!(run.error.as_deref(), Some("cancelled"));
        assert!(fixture.registry.versions().expect("versions").is_empty());
        assert_eq!(fixture.monitor.status().total_retrains, 0);
    }

    #[test]
    fn test_concurrent_trigger_is_refused() {
        let fixture = fixture();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let backend = Arc::new(BlockingBackend {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let orchestrator = Arc::new(orchestrator(&fixture, backend, RetrainPolicy::default()));

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            thread::spawn(move || orchestrator.run("first", &CancelToken::new()))
        };
        started_rx.recv().expect("first run started");

        assert!(matches!(
            orchestrator.run("second", &CancelToken::new()),
            Err(RetrainError::RetrainInProgress)
        ));
        assert!(matches!(
            orchestrator.check_and_run(None, true, &CancelToken::new()),
            Err(RetrainError::RetrainInProgress)
        ));

        release_tx.send(()).expect("release");
        let run = first.join().expect("thread").expect("first run");
        assert_eq!(run.decision, RunDecision::Accepted);
        // The refused triggers left no trace in the run log or the monitor.
        assert_eq!(fixture.registry.list_history().expect("history").len(), 1);
        assert!(
            !fixture
                .monitor
                .history()
                .iter()
                .any(|event| matches!(event.kind, MonitorEventKind::Triggered { .. }))
        );
    }

    #[test]
    fn test_run_is_refused_across_registry_handles() {
        let fixture = fixture();
        let sibling = fixture.sibling();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let backend = Arc::new(BlockingBackend {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let first = Arc::new(orchestrator(&fixture, backend, RetrainPolicy::default()));
        let second = orchestrator(&sibling, ScriptedBackend::new(0.95), RetrainPolicy::default());

        let handle = {
            let first = Arc::clone(&first);
            thread::spawn(move || first.run("first", &CancelToken::new()))
        };
        started_rx.recv().expect("first run started");

        assert!(matches!(
            second.run("second", &CancelToken::new()),
            Err(RetrainError::RetrainInProgress)
        ));
        assert!(!second.is_running());

        release_tx.send(()).expect("release");
        let run = handle.join().expect("thread").expect("first run");
        assert_eq!(run.version, Some(1));

        let run = second.run("second", &CancelToken::new()).expect("second run");
        assert_eq!(run.version, Some(2));
        assert_eq!(fixture.registry.get_active().expect("active").version, 2);
    }

    #[test]
    fn test_storage_error_during_put_keeps_incumbent() {
        let fixture = fixture();
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());
        orchestrator.run("seed", &CancelToken::new()).expect("seed");

        // The version counter can no longer be replaced.
        std::fs::create_dir(fixture.models().join("VERSION.tmp")).expect("block VERSION");

        let run = orchestrator.run("manual", &CancelToken::new()).expect("run");
        assert_eq!(run.decision, RunDecision::RejectedError);
        assert_eq!(run.version, None);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("registry failed")));
        assert_eq!(fixture.registry.get_active().expect("active").version, 1);
        assert_eq!(fixture.registry.versions().expect("versions"), vec![1]);
        assert_eq!(fixture.registry.list_history().expect("history").len(), 2);
        assert_eq!(fixture.monitor.status().total_retrains, 1);
        assert!(!orchestrator.is_running());
    }

    #[test]
    fn test_storage_error_during_activation_keeps_incumbent() {
        let fixture = fixture();
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());
        orchestrator.run("seed", &CancelToken::new()).expect("seed");

        // The active pointer can no longer be replaced.
        std::fs::create_dir(fixture.models().join("ACTIVE.tmp")).expect("block ACTIVE");

        let run = orchestrator.run("manual", &CancelToken::new()).expect("run");
        assert_eq!(run.decision, RunDecision::RejectedError);
        assert_eq!(run.version, None);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("registry failed")));
        assert_eq!(fixture.registry.get_active().expect("active").version, 1);
        assert_eq!(
            fixture.registry.last_accepted().expect("history").map(|r| r.version),
            Some(Some(1))
        );
        assert_eq!(fixture.monitor.status().total_retrains, 1);
    }

    #[test]
    fn test_unavailable_data_records_no_run() {
        let fixture = fixture_with(Arc::new(MissingSource));
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());

        assert!(matches!(
            orchestrator.run("manual", &CancelToken::new()),
            Err(RetrainError::DataUnavailable(_))
        ));
        assert!(fixture.registry.list_history().expect("history").is_empty());
        assert!(!orchestrator.is_running());
    }

    #[test]
    fn test_retention_when_backups_disabled() {
        let fixture = fixture();
        let policy = RetrainPolicy {
            backup_enabled: false,
            ..RetrainPolicy::default()
        };
        let orchestrator = orchestrator(&fixture, ScriptedBackend::new(0.95), policy);
        for _ in 0..4 {
            orchestrator.run("manual", &CancelToken::new()).expect("run");
        }

        assert_eq!(fixture.registry.versions().expect("versions"), vec![3, 4]);
    }

    #[test]
    fn test_retention_when_backups_enabled() {
        let fixture = fixture();
        let policy = RetrainPolicy {
            backup_retention: 2,
            ..RetrainPolicy::default()
        };
        let orchestrator = orchestrator(&fixture, ScriptedBackend::new(0.95), policy);
        for _ in 0..5 {
            orchestrator.run("manual", &CancelToken::new()).expect("run");
        }

        assert_eq!(fixture.registry.versions().expect("versions"), vec![3, 4, 5]);
    }

    #[test]
    fn test_check_and_run_respects_threshold() {
        let fixture = fixture();
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());

        let first = orchestrator
            .check_and_run(None, false, &CancelToken::new())
            .expect("first");
        assert!(first.is_some_and(|run| run.is_accepted()));

        // Baseline is now 400 rows and no new data arrived.
        let second = orchestrator
            .check_and_run(None, false, &CancelToken::new())
            .expect("second");
        assert!(second.is_none());

        let forced = orchestrator
            .check_and_run(None, true, &CancelToken::new())
            .expect("forced");
        assert_eq!(forced.map(|run| run.reason), Some(String::from("forced")));
    }

    #[test]
    fn test_old_model_triggers_retrain_without_new_rows() {
        let fixture = fixture();
        fixture.activate(0.95, Utc::now() - TimeDelta::days(30));
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());

        let run = orchestrator
            .check_and_run(Some(10_000), false, &CancelToken::new())
            .expect("check")
            .expect("stale model should retrain");

        assert!(run.reason.contains("30 days old"), "reason was {}", run.reason);
        assert_eq!(run.version, Some(2));
        assert!(fixture.monitor.history().iter().any(
            |event| matches!(&event.kind, MonitorEventKind::Triggered { reason } if reason == &run.reason)
        ));
    }

    #[test]
    fn test_age_trigger_can_be_disabled() {
        let fixture = fixture();
        fixture.activate(0.95, Utc::now() - TimeDelta::days(30));
        let policy = RetrainPolicy {
            max_model_age_days: None,
            ..RetrainPolicy::default()
        };
        let orchestrator = orchestrator(&fixture, ScriptedBackend::new(0.95), policy);

        let run = orchestrator
            .check_and_run(Some(10_000), false, &CancelToken::new())
            .expect("check");
        assert!(run.is_none());
    }

    #[test]
    fn test_weak_incumbent_triggers_retrain() {
        let fixture = fixture();
        fixture.activate(0.70, Utc::now());
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());

        let run = orchestrator
            .check_and_run(Some(10_000), false, &CancelToken::new())
            .expect("check")
            .expect("weak incumbent should retrain");

        assert!(run.reason.contains("below"), "reason was {}", run.reason);
        assert_eq!(run.baseline_test_auc, Some(0.70));
        assert!(run.is_accepted());
    }

    #[test]
    fn test_no_model_is_never_stale() {
        let fixture = fixture();
        let orchestrator =
            orchestrator(&fixture, ScriptedBackend::new(0.95), RetrainPolicy::default());

        let run = orchestrator
            .check_and_run(Some(10_000), false, &CancelToken::new())
            .expect("check");
        assert!(run.is_none());
    }
}
