use core::str::FromStr;
use core::time::Duration;
use std::path::PathBuf;

use anyhow::{Context, Result};
use fraud_structs::RetrainPolicy;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// CSV file holding the transaction training data.
    pub data_path: PathBuf,

    /// Root directory of the model registry.
    pub model_dir: PathBuf,

    /// Directory for log files written by long-running commands.
    pub logs_dir: PathBuf,

    /// Default tracing filter.
    pub log_level: String,

    /// Whether `watch` polls the data source on a schedule.
    pub enable_model_watcher: bool,

    /// Seconds between scheduled data checks.
    pub watcher_interval: Duration,

    /// Upper bound on retrying a reload notification.
    pub reload_timeout: Duration,

    /// Quality gates and retention for retraining.
    pub policy: RetrainPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Every variable is optional:
    /// - `DATA_PATH`: transaction CSV (default: `data/transactions.csv`)
    /// - `MODEL_DIR`: registry root (default: `models`)
    /// - `LOGS_DIR`: log directory (default: `logs`)
    /// - `LOG_LEVEL`: tracing filter (default: `info`)
    /// - `ENABLE_MODEL_WATCHER`, `WATCHER_INTERVAL` (seconds, default 30)
    /// - `RELOAD_TIMEOUT_SECS` (default 30)
    /// - `MIN_NEW_ROWS`, `MIN_TEST_AUC`, `MAX_DEGRADATION`, `BACKUP_ENABLED`,
    ///   `RUN_POST_TRAIN_CHECKS`, `BACKUP_RETENTION`
    /// - `MAX_MODEL_AGE_DAYS`: age that triggers a retrain (default 7, `0`
    ///   disables)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// resulting retrain policy is out of range.
    pub fn from_env() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = RetrainPolicy::default();

        let policy = RetrainPolicy {
            min_new_rows: parse_or(&lookup, "MIN_NEW_ROWS", defaults.min_new_rows)?,
            min_test_auc: parse_or(&lookup, "MIN_TEST_AUC", defaults.min_test_auc)?,
            max_degradation: parse_or(&lookup, "MAX_DEGRADATION", defaults.max_degradation)?,
            backup_enabled: parse_flag(&lookup, "BACKUP_ENABLED", defaults.backup_enabled)?,
            run_post_train_checks: parse_flag(
                &lookup,
                "RUN_POST_TRAIN_CHECKS",
                defaults.run_post_train_checks,
            )?,
            backup_retention: parse_or(&lookup, "BACKUP_RETENTION", defaults.backup_retention)?,
            max_model_age_days: match lookup("MAX_MODEL_AGE_DAYS") {
                None => defaults.max_model_age_days,
                Some(_) => Some(parse_or(&lookup, "MAX_MODEL_AGE_DAYS", 0u64)?)
                    .filter(|&days| days > 0),
            },
        };
        policy.validate().context("Invalid retrain policy")?;

        Ok(Self {
            data_path: lookup("DATA_PATH")
                .map_or_else(|| PathBuf::from("data/transactions.csv"), PathBuf::from),
            model_dir: lookup("MODEL_DIR").map_or_else(|| PathBuf::from("models"), PathBuf::from),
            logs_dir: lookup("LOGS_DIR").map_or_else(|| PathBuf::from("logs"), PathBuf::from),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| String::from("info")),
            enable_model_watcher: parse_flag(&lookup, "ENABLE_MODEL_WATCHER", true)?,
            watcher_interval: Duration::from_secs(parse_or(&lookup, "WATCHER_INTERVAL", 30)?),
            reload_timeout: Duration::from_secs(parse_or(&lookup, "RELOAD_TIMEOUT_SECS", 30)?),
            policy,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: core::error::Error + Send + Sync + 'static,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}"))
    })
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{key} must be a boolean, got {raw:?}"),
    }
}
