use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{TaskPriority, TaskState};

/// Category label used for tasks that do not declare one.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Scheduler operational metrics exposed to monitoring front-ends.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Tasks that completed successfully, by category.
    pub tasks_completed: HashMap<String, u64>,
    /// Tasks that failed, by category.
    pub tasks_failed: HashMap<String, u64>,
    /// Average `compute` duration by category.
    pub avg_task_duration: HashMap<String, Duration>,
    /// Last finish time by category.
    pub last_finished: HashMap<String, DateTime<Utc>>,
    /// Number of queued tasks per priority level.
    pub tasks_pending: HashMap<TaskPriority, usize>,
    /// Worker utilization ratio (0.0 - 1.0).
    pub worker_utilization: f64,
    /// Descriptors created by `submit`/`submit_unique`.
    pub total_submitted: u64,
    /// `submit_unique` calls rejected as duplicates.
    pub total_deduplicated: u64,
}

impl SchedulerMetrics {
    /// Record a task reaching a terminal state.
    pub fn record_execution(&mut self, category: Option<&str>, state: TaskState, duration: Duration) {
        let category = category.unwrap_or(UNCATEGORIZED);
        let counter = match state {
            TaskState::Failed => &mut self.tasks_failed,
            _ => &mut self.tasks_completed,
        };
        *counter.entry(category.to_string()).or_default() += 1;
        self.last_finished.insert(category.to_string(), Utc::now());

        let count = self.executions(category);
        let prev_avg = self
            .avg_task_duration
            .get(category)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count <= 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos.max(0.0) as u64)
        };

        self.avg_task_duration.insert(category.to_string(), new_avg);
    }

    /// Completed plus failed executions for `category`.
    pub fn executions(&self, category: &str) -> u64 {
        self.tasks_completed.get(category).copied().unwrap_or(0)
            + self.tasks_failed.get(category).copied().unwrap_or(0)
    }

    pub fn total_completed(&self) -> u64 {
        self.tasks_completed.values().sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.tasks_failed.values().sum()
    }
}
