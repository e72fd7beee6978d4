use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::TaskDescriptor;
use crate::task::TaskKey;
use crate::types::{DispatchRank, TaskPriority, TaskState};

/// Immutable point-in-time copy of a descriptor and its task's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: u64,
    pub priority: TaskPriority,
    pub owner: Option<String>,
    pub key: TaskKey,
    pub category: Option<String>,
    pub title: String,
    pub enqueue_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub state: TaskState,
    pub status_line: String,
    pub progress: u8,
}

impl TaskSnapshot {
    /// Copy everything out of a live descriptor.
    ///
    /// State and timestamps are read together under the descriptor's
    /// lifecycle lock, so they are mutually consistent.
    pub fn capture(descriptor: &TaskDescriptor) -> Self {
        let lifecycle = descriptor.lifecycle();
        let task = descriptor.task();
        Self {
            id: descriptor.id(),
            priority: descriptor.priority(),
            owner: descriptor.owner().map(str::to_string),
            key: task.key(),
            category: task.category().map(str::to_string),
            title: task.title().to_string(),
            enqueue_time: descriptor.enqueue_time(),
            start_time: lifecycle.start_time,
            finish_time: lifecycle.finish_time,
            state: lifecycle.state,
            status_line: task.status_line(),
            progress: task.progress(),
        }
    }

    /// Like [`capture`](Self::capture) but without calling into the task.
    /// Task-supplied fields are left empty.
    pub(crate) fn capture_bare(descriptor: &TaskDescriptor) -> Self {
        let lifecycle = descriptor.lifecycle();
        Self {
            id: descriptor.id(),
            priority: descriptor.priority(),
            owner: descriptor.owner().map(str::to_string),
            key: TaskKey::Unkeyed,
            category: None,
            title: String::new(),
            enqueue_time: descriptor.enqueue_time(),
            start_time: lifecycle.start_time,
            finish_time: lifecycle.finish_time,
            state: lifecycle.state,
            status_line: String::new(),
            progress: 0,
        }
    }

    pub fn dispatch_rank(&self) -> DispatchRank {
        DispatchRank::new(self.priority, self.id)
    }

    /// Wall-clock time spent in `compute`, once finished.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) => Some(finish - start),
            _ => None,
        }
    }
}

// ── Comparators ──────────────────────────────────────────────

/// Dispatch order: priority first, then earliest submission.
pub fn execution_order(a: &TaskSnapshot, b: &TaskSnapshot) -> Ordering {
    a.dispatch_rank().cmp(&b.dispatch_rank())
}

/// Reporting order for merged queued + processing views: state ordinal,
/// then priority, then id.
pub fn display_order(a: &TaskSnapshot, b: &TaskSnapshot) -> Ordering {
    a.state
        .cmp(&b.state)
        .then_with(|| execution_order(a, b))
}

/// History order: earliest finish first, ties by id. Unfinished sorts last.
pub fn history_order(a: &TaskSnapshot, b: &TaskSnapshot) -> Ordering {
    let by_finish = match (a.finish_time, b.finish_time) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_finish.then_with(|| a.id.cmp(&b.id))
}
