//! Live per-submission handle.
//!
//! A [`TaskDescriptor`] is created by the scheduler for every accepted
//! submission and shared between the scheduler and the submitter. It
//! carries identity, timestamps and the lifecycle state, and doubles as
//! the future-like handle for awaiting the task's result.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};

use crate::error::TaskError;
use crate::queue::ReadyQueue;
use crate::snapshot::TaskSnapshot;
use crate::task::{Task, TaskOutput};
use crate::types::{DispatchRank, TaskPriority, TaskState};

/// Final outcome of a descriptor as seen by awaiting threads.
pub type TaskResult = Result<TaskOutput, Arc<TaskError>>;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Lifecycle {
    pub state: TaskState,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

pub struct TaskDescriptor {
    id: u64,
    priority: TaskPriority,
    owner: Option<String>,
    enqueue_time: DateTime<Utc>,
    task: Arc<dyn Task>,
    lifecycle: Mutex<Lifecycle>,
    outcome: Mutex<Option<TaskResult>>,
    done: Condvar,
    interrupted: AtomicBool,
    cancelled: AtomicBool,
    /// Back-reference used by `cancel` to pull the descriptor off the queue.
    queue: Weak<ReadyQueue>,
}

impl TaskDescriptor {
    pub(crate) fn new(
        id: u64,
        priority: TaskPriority,
        owner: Option<String>,
        task: Arc<dyn Task>,
        queue: Weak<ReadyQueue>,
    ) -> Self {
        Self {
            id,
            priority,
            owner,
            enqueue_time: Utc::now(),
            task,
            lifecycle: Mutex::new(Lifecycle {
                state: TaskState::Awaiting,
                start_time: None,
                finish_time: None,
            }),
            outcome: Mutex::new(None),
            done: Condvar::new(),
            interrupted: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            queue,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn dispatch_rank(&self) -> DispatchRank {
        DispatchRank::new(self.priority, self.id)
    }

    /// Principal that submitted the task, if one was resolved.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    pub fn enqueue_time(&self) -> DateTime<Utc> {
        self.enqueue_time
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().start_time
    }

    pub fn finish_time(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().finish_time
    }

    pub fn state(&self) -> TaskState {
        self.lifecycle.lock().state
    }

    /// Immutable point-in-time copy of this descriptor.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot::capture(self)
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    // ── Lifecycle transitions (scheduler only) ───────────────────────

    /// Awaiting → Processing. Returns false if the descriptor already left
    /// Awaiting.
    pub(crate) fn mark_processing(&self) -> bool {
        let mut lc = self.lifecycle.lock();
        if lc.state != TaskState::Awaiting {
            return false;
        }
        lc.state = TaskState::Processing;
        lc.start_time = Some(Utc::now());
        true
    }

    /// Processing → Completed/Failed. Returns the recorded terminal state.
    pub(crate) fn mark_finished(&self, succeeded: bool) -> TaskState {
        let mut lc = self.lifecycle.lock();
        if lc.state.is_terminal() {
            return lc.state;
        }
        lc.state = if succeeded {
            TaskState::Completed
        } else {
            TaskState::Failed
        };
        lc.finish_time = Some(Utc::now());
        lc.state
    }

    /// Publish the outcome and wake every waiter. The first outcome wins.
    pub(crate) fn resolve(&self, result: TaskResult) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(result);
            self.done.notify_all();
        }
    }

    /// Resolve a descriptor that will never run.
    pub(crate) fn abandon(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.resolve(Err(Arc::new(TaskError::Cancelled)));
    }

    pub(crate) fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    pub(crate) fn interrupt_flag(&self) -> &AtomicBool {
        &self.interrupted
    }

    // ── Result-awaiting contract ─────────────────────────────────────

    /// Whether an outcome (value, error or cancellation) is available.
    pub fn is_done(&self) -> bool {
        self.outcome.lock().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether interruption was requested for this execution.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Block until the task finishes and return its outcome.
    pub fn get(&self) -> TaskResult {
        let mut slot = self.outcome.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut slot);
        }
    }

    /// Like [`get`](Self::get) but gives up after `timeout`, returning `None`.
    /// A timeout too large to express as a deadline waits indefinitely.
    pub fn get_timeout(&self, timeout: Duration) -> Option<TaskResult> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.get());
        };
        let mut slot = self.outcome.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return Some(result.clone());
            }
            if self.done.wait_until(&mut slot, deadline).timed_out() {
                return slot.as_ref().cloned();
            }
        }
    }

    /// Block for the outcome and downcast a successful value to `T`.
    ///
    /// Returns `Ok(None)` if the task succeeded with a value of another type.
    pub fn get_as<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, Arc<TaskError>> {
        let value = self.get()?;
        Ok(value.downcast::<T>().ok())
    }

    /// Attempt to cancel the task.
    ///
    /// A task still in the ready queue is removed without running and
    /// resolves to [`TaskError::Cancelled`]; this returns true. A task that
    /// is already running only gets its interrupt flag raised, which the
    /// body may or may not observe; this returns false. Finished tasks are
    /// left alone.
    pub fn cancel(&self) -> bool {
        if self.is_done() {
            return false;
        }
        if let Some(queue) = self.queue.upgrade() {
            if queue.remove(self.id).is_some() {
                self.abandon();
                return true;
            }
        }
        self.interrupt();
        false
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("owner", &self.owner)
            .field("title", &self.task.title())
            .field("state", &self.state())
            .finish()
    }
}
