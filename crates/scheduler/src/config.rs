use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SchedulerError;

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. Must be > 0.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Number of finished-task snapshots retained for inspection.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Worker threads are named `{prefix}-{n}`.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// How long front-ends wait for workers after requesting shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_pool_size() -> usize { 4 }
fn default_history_limit() -> usize { 100 }
fn default_thread_name_prefix() -> String { "taskdeck-worker".into() }
fn default_shutdown_timeout() -> u64 { 10 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            history_limit: default_history_limit(),
            thread_name_prefix: default_thread_name_prefix(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

// ── Loading & Validation ────────────────────────────────────────────

impl SchedulerConfig {
    /// Config with explicit pool and history sizes and defaults elsewhere.
    pub fn new(pool_size: usize, history_limit: usize) -> Self {
        Self {
            pool_size,
            history_limit,
            ..Self::default()
        }
    }

    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus environment overrides (call `dotenvy::dotenv()` first
    /// if a `.env` file should be honored).
    pub fn from_env() -> Result<Self, SchedulerError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.pool_size == 0 {
            return Err(SchedulerError::Config("pool_size must be greater than 0".into()));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(SchedulerError::Config("thread_name_prefix must not be empty".into()));
        }
        Ok(())
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `TASKDECK_KEY` overrides `key`. Unparseable values are
    /// logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parsed("TASKDECK_POOL_SIZE") {
            self.pool_size = v;
        }
        if let Some(v) = env_parsed("TASKDECK_HISTORY_LIMIT") {
            self.history_limit = v;
        }
        if let Some(v) = env_opt("TASKDECK_THREAD_PREFIX") {
            self.thread_name_prefix = v;
        }
        if let Some(v) = env_parsed("TASKDECK_SHUTDOWN_TIMEOUT_SECS") {
            self.shutdown_timeout_secs = v;
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_opt(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}
