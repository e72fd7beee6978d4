use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::descriptor::TaskDescriptor;
use crate::error::SchedulerError;
use crate::task::{same_task, Task};
use crate::types::TaskPriority;

use super::Scheduler;

impl Scheduler {
    /// Queue `task` for execution and return its live descriptor.
    ///
    /// `None` priority means [`TaskPriority::Medium`]. Never blocks on
    /// dispatch. Fails with [`SchedulerError::ShutDown`] once shutdown has
    /// been requested.
    pub fn submit(
        &self,
        task: Arc<dyn Task>,
        priority: Option<TaskPriority>,
    ) -> Result<Arc<TaskDescriptor>, SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::ShutDown);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let priority = TaskPriority::or_default(priority);
        let owner = self.resolver.current_principal();
        let descriptor = Arc::new(TaskDescriptor::new(
            id,
            priority,
            owner,
            task,
            Arc::downgrade(&self.shared.queue),
        ));

        // The queue closes on shutdown, which catches a submit racing it.
        self.shared
            .queue
            .push(Arc::clone(&descriptor))
            .map_err(|_| SchedulerError::ShutDown)?;
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);

        debug!(
            id,
            priority = %priority,
            title = descriptor.task().title(),
            "task submitted"
        );
        Ok(descriptor)
    }

    /// Like [`submit`](Self::submit), unless an equal task is still waiting
    /// in the ready queue, in which case nothing is queued and `Ok(None)`
    /// is returned.
    ///
    /// Deduplication is best effort. Only the ready queue is scanned, so a
    /// duplicate of a task that is already running is accepted. The scan
    /// and the insert are separate steps, so two concurrent callers can
    /// both miss each other and both get queued.
    pub fn submit_unique(
        &self,
        task: Arc<dyn Task>,
        priority: Option<TaskPriority>,
    ) -> Result<Option<Arc<TaskDescriptor>>, SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::ShutDown);
        }

        if let Some(existing) = self.shared.queue.find(|d| same_task(d.task(), &task)) {
            self.shared.deduplicated.fetch_add(1, Ordering::Relaxed);
            debug!(
                existing = existing.id(),
                title = task.title(),
                "duplicate submission ignored"
            );
            return Ok(None);
        }

        self.submit(task, priority).map(Some)
    }
}
