use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Value produced by a successful [`Task::compute`].
///
/// Reference counted so any number of threads awaiting the same descriptor
/// can hold it. Use [`crate::TaskDescriptor::get_as`] to downcast.
pub type TaskOutput = Arc<dyn Any + Send + Sync>;

/// Deduplication identity of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum TaskKey {
    /// Caller-supplied identity; equal values mean "the same logical task".
    Value(String),
    /// No key. Such a task is only ever a duplicate of itself.
    #[default]
    Unkeyed,
}

impl From<&str> for TaskKey {
    fn from(v: &str) -> Self {
        TaskKey::Value(v.to_string())
    }
}

impl From<String> for TaskKey {
    fn from(v: String) -> Self {
        TaskKey::Value(v)
    }
}

impl From<u64> for TaskKey {
    fn from(v: u64) -> Self {
        TaskKey::Value(v.to_string())
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Value(v) => f.write_str(v),
            TaskKey::Unkeyed => f.write_str("-"),
        }
    }
}

/// Mutable progress and status line of a running task.
///
/// Written by the task body, read concurrently by inspectors. Readers may
/// observe slightly stale values.
#[derive(Debug, Default)]
pub struct TaskStatus {
    progress: AtomicU8,
    line: RwLock<String>,
}

impl TaskStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Store `progress` clamped into `0..=100`.
    pub fn set_progress(&self, progress: i64) {
        let clamped = progress.clamp(0, 100) as u8;
        self.progress.store(clamped, Ordering::Relaxed);
    }

    pub fn status_line(&self) -> String {
        self.line.read().clone()
    }

    pub fn set_status_line(&self, line: impl Into<String>) {
        *self.line.write() = line.into();
    }
}

/// Per-execution handle passed to [`Task::compute`].
pub struct TaskContext<'a> {
    descriptor_id: u64,
    interrupted: &'a AtomicBool,
}

impl<'a> TaskContext<'a> {
    pub fn new(descriptor_id: u64, interrupted: &'a AtomicBool) -> Self {
        Self {
            descriptor_id,
            interrupted,
        }
    }

    /// Id of the descriptor this execution belongs to.
    pub fn descriptor_id(&self) -> u64 {
        self.descriptor_id
    }

    /// Whether a cancel or forced shutdown has asked this execution to stop.
    ///
    /// Long-running bodies should poll this and bail out early.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// `Err(TaskError::Interrupted)` once interruption was requested.
    pub fn check_interrupted(&self) -> Result<(), TaskError> {
        if self.is_interrupted() {
            Err(TaskError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// A unit of work the scheduler can execute.
///
/// `key`, `category` and `title` must not change once the task is
/// submitted. Progress and status go through [`Task::status`].
pub trait Task: Send + Sync {
    /// Deduplication identity used by `submit_unique`.
    fn key(&self) -> TaskKey {
        TaskKey::Unkeyed
    }

    /// Optional grouping label, used for metrics and reporting.
    fn category(&self) -> Option<&str> {
        None
    }

    /// Human-readable name for logging and inspection.
    fn title(&self) -> &str;

    /// Mutable progress/status storage owned by the task.
    fn status(&self) -> &TaskStatus;

    /// Perform the work.
    fn compute(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError>;

    fn progress(&self) -> u8 {
        self.status().progress()
    }

    fn set_progress(&self, progress: i64) {
        self.status().set_progress(progress)
    }

    fn status_line(&self) -> String {
        self.status().status_line()
    }

    fn set_status_line(&self, line: &str) {
        self.status().set_status_line(line)
    }
}

/// Whether two submitted tasks count as duplicates.
///
/// Keyed tasks compare by key. Unkeyed tasks only match the very same
/// object, so unrelated unkeyed tasks never collide.
pub fn same_task(a: &Arc<dyn Task>, b: &Arc<dyn Task>) -> bool {
    match (a.key(), b.key()) {
        (TaskKey::Value(x), TaskKey::Value(y)) => x == y,
        (TaskKey::Unkeyed, TaskKey::Unkeyed) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        _ => false,
    }
}
