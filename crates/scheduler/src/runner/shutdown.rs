use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::descriptor::TaskDescriptor;
use crate::error::SchedulerError;

use super::Scheduler;

impl Scheduler {
    /// Stop accepting submissions.
    ///
    /// Graceful: queued and running tasks are allowed to finish, then the
    /// workers exit. Returns an empty vector.
    ///
    /// Forced: the ready queue is drained and every drained descriptor is
    /// resolved as cancelled and returned. Running tasks get their
    /// interrupt flag raised but still pass through the after-hook, so the
    /// processing set and history stay consistent.
    pub fn shutdown(&self, graceful: bool) -> Vec<Arc<TaskDescriptor>> {
        self.accepting.store(false, Ordering::SeqCst);

        if graceful {
            info!(
                queued = self.shared.queue.len(),
                processing = self.shared.processing.len(),
                "graceful shutdown requested"
            );
            self.shared.queue.close();
            return Vec::new();
        }

        let abandoned = self.shared.queue.close_and_drain();
        for descriptor in &abandoned {
            descriptor.abandon();
        }
        let mut interrupted = 0usize;
        for entry in self.shared.processing.iter() {
            entry.value().interrupt();
            interrupted += 1;
        }
        warn!(
            abandoned = abandoned.len(),
            interrupted, "forced shutdown requested"
        );
        abandoned
    }

    pub fn shutdown_graceful(&self) {
        self.shutdown(true);
    }

    pub fn shutdown_now(&self) -> Vec<Arc<TaskDescriptor>> {
        self.shutdown(false)
    }

    pub fn is_shutdown(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }

    /// Wait until every worker thread has exited, or `timeout` elapses.
    /// Returns true if all workers are gone. A timeout too large to express
    /// as a deadline waits indefinitely.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut live = self.shared.live_workers.lock();
        while *live > 0 {
            match deadline {
                Some(deadline) => {
                    if self.shared.workers_exited.wait_until(&mut live, deadline).timed_out() {
                        return *live == 0;
                    }
                }
                None => self.shared.workers_exited.wait(&mut live),
            }
        }
        true
    }

    /// Join every worker thread.
    ///
    /// Requests a graceful shutdown first if none was requested, so this
    /// returns once the queue has drained. A worker thread that died is
    /// reported as [`SchedulerError::WorkerPanicked`].
    pub fn join(&self) -> Result<(), SchedulerError> {
        if !self.is_shutdown() {
            self.shutdown(true);
        }

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let mut failure = None;
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "worker thread panicked");
                failure.get_or_insert(SchedulerError::WorkerPanicked(name));
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.is_shutdown() {
            self.shutdown(false);
        }
    }
}
