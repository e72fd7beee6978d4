//! Scheduler and task error types.

use thiserror::Error;

/// Errors raised synchronously by the scheduler itself.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("scheduler is shut down")]
    ShutDown,

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("worker thread died: {0}")]
    WorkerPanicked(String),
}

/// Why a task did not produce a value.
///
/// Shared behind an `Arc` so every thread awaiting a descriptor sees the
/// same error.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("task was cancelled before it started")]
    Cancelled,

    #[error("task was interrupted")]
    Interrupted,

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Convenience constructor for ad-hoc failure messages.
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }
}
