use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::descriptor::TaskDescriptor;
use crate::error::TaskError;
use crate::snapshot::TaskSnapshot;
use crate::task::{TaskContext, TaskOutput};

use super::core::Shared;

/// Decrements the live-worker count when a worker thread exits, however
/// it exits.
struct WorkerExit<'a> {
    shared: &'a Shared,
    worker: usize,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(worker = self.worker, "worker thread died unexpectedly");
        }
        let mut live = self.shared.live_workers.lock();
        *live = live.saturating_sub(1);
        if *live == 0 {
            self.shared.workers_exited.notify_all();
        }
    }
}

impl Shared {
    /// Dispatch loop run by every worker thread until the queue is closed
    /// and drained.
    pub(super) fn worker_loop(&self, worker: usize) {
        let _exit = WorkerExit {
            shared: self,
            worker,
        };
        info!(worker, "worker started");

        while let Some(descriptor) = self.queue.pop_blocking() {
            self.run(&descriptor);
        }

        info!(worker, "worker stopped");
    }

    fn run(&self, descriptor: &Arc<TaskDescriptor>) {
        if !self.before_execute(descriptor) {
            return;
        }

        let ctx = TaskContext::new(descriptor.id(), descriptor.interrupt_flag());
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| descriptor.task().compute(&ctx)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        };

        self.after_execute(descriptor, result, started.elapsed());
    }

    /// Lifecycle hook run before `compute`: Awaiting → Processing and
    /// registration in the processing set.
    pub(super) fn before_execute(&self, descriptor: &Arc<TaskDescriptor>) -> bool {
        if !descriptor.mark_processing() {
            warn!(id = descriptor.id(), state = %descriptor.state(), "skipping descriptor that already left the queue state");
            return false;
        }
        self.processing.insert(descriptor.id(), Arc::clone(descriptor));
        self.active_workers.fetch_add(1, Ordering::Relaxed);

        debug!(
            id = descriptor.id(),
            priority = %descriptor.priority(),
            "task dispatched"
        );
        true
    }

    /// Lifecycle hook run after `compute`, whatever its outcome.
    ///
    /// Task metadata is read under `catch_unwind` so a panicking accessor
    /// cannot kill the worker or strand the descriptor. The outcome is
    /// published last so a caller returning from `TaskDescriptor::get`
    /// already sees the task in history.
    pub(super) fn after_execute(
        &self,
        descriptor: &Arc<TaskDescriptor>,
        result: Result<TaskOutput, TaskError>,
        elapsed: Duration,
    ) {
        let state = descriptor.mark_finished(result.is_ok());
        self.processing.remove(&descriptor.id());

        let snapshot = panic::catch_unwind(AssertUnwindSafe(|| descriptor.snapshot()))
            .unwrap_or_else(|payload| {
                error!(
                    id = descriptor.id(),
                    panic = %panic_message(payload.as_ref()),
                    "task metadata accessor panicked"
                );
                TaskSnapshot::capture_bare(descriptor)
            });

        self.metrics
            .write()
            .record_execution(snapshot.category.as_deref(), state, elapsed);

        match &result {
            Ok(_) => debug!(
                id = descriptor.id(),
                title = %snapshot.title,
                elapsed_ms = elapsed.as_millis() as u64,
                "task completed"
            ),
            Err(e) => warn!(
                id = descriptor.id(),
                title = %snapshot.title,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "task failed"
            ),
        }

        self.history.push(snapshot);
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
        descriptor.resolve(result.map_err(Arc::new));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
