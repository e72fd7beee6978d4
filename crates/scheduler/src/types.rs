use std::fmt;

use serde::{Deserialize, Serialize};

/// Task execution priority. Earlier variants are dispatched first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Jumps ahead of everything else in the ready queue.
    Highest = 0,
    High = 1,
    /// Used when a submission does not name a priority.
    #[default]
    Medium = 2,
    Low = 3,
    /// Background work that tolerates arbitrary delay.
    Lowest = 4,
}

impl TaskPriority {
    /// All priority classes in execution order.
    pub const ALL: [TaskPriority; 5] = [
        TaskPriority::Highest,
        TaskPriority::High,
        TaskPriority::Medium,
        TaskPriority::Low,
        TaskPriority::Lowest,
    ];

    /// Resolve an optional priority, falling back to [`TaskPriority::Medium`].
    pub fn or_default(priority: Option<TaskPriority>) -> TaskPriority {
        priority.unwrap_or_default()
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::Highest => "highest",
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
            TaskPriority::Lowest => "lowest",
        };
        f.write_str(s)
    }
}

/// Dispatch precedence of a submission: priority first, then the earlier
/// id. Smaller ranks run first. The ready queue and `execution_order` both
/// compare through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchRank {
    pub priority: TaskPriority,
    pub id: u64,
}

impl DispatchRank {
    pub fn new(priority: TaskPriority, id: u64) -> Self {
        Self { priority, id }
    }
}

/// Lifecycle state of a submitted task.
///
/// The declaration order is the ordinal order used by the display comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Sitting in the ready queue.
    Awaiting,
    /// Picked up by a worker; `compute` is running.
    Processing,
    /// `compute` returned a value.
    Completed,
    /// `compute` returned an error or panicked.
    Failed,
}

impl TaskState {
    /// Completed and Failed are never left once entered.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Awaiting => "awaiting",
            TaskState::Processing => "processing",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}
