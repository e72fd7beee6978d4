use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::descriptor::TaskDescriptor;
use crate::error::SchedulerError;
use crate::history::HistoryBuffer;
use crate::metrics::SchedulerMetrics;
use crate::principal::{Anonymous, PrincipalResolver};
use crate::queue::ReadyQueue;

/// State shared between the scheduler handle and its worker threads.
pub(super) struct Shared {
    pub(super) queue: Arc<ReadyQueue>,
    /// Descriptors currently inside `compute`, keyed by id.
    pub(super) processing: DashMap<u64, Arc<TaskDescriptor>>,
    pub(super) history: HistoryBuffer,
    pub(super) metrics: RwLock<SchedulerMetrics>,
    pub(super) pool_size: usize,
    /// Workers currently executing a task.
    pub(super) active_workers: AtomicUsize,
    /// Workers whose thread has not exited yet.
    pub(super) live_workers: Mutex<usize>,
    pub(super) workers_exited: Condvar,
    pub(super) submitted: AtomicU64,
    pub(super) deduplicated: AtomicU64,
}

/// Priority-aware background task scheduler.
///
/// Owns a fixed pool of worker threads that pull [`TaskDescriptor`]s off a
/// priority-ordered ready queue, run them, and retain a bounded history of
/// finished tasks for inspection.
pub struct Scheduler {
    pub(super) config: SchedulerConfig,
    pub(super) shared: Arc<Shared>,
    /// Source of descriptor ids; never reused.
    pub(super) next_id: AtomicU64,
    pub(super) resolver: Arc<dyn PrincipalResolver>,
    pub(super) accepting: AtomicBool,
    pub(super) workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler and start its workers.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_resolver(config, Arc::new(Anonymous))
    }

    /// Shorthand for a default config with the given pool and history sizes.
    pub fn with_pool(pool_size: usize, history_limit: usize) -> Result<Self, SchedulerError> {
        Self::new(SchedulerConfig::new(pool_size, history_limit))
    }

    /// Create a scheduler that stamps submissions with `resolver`'s principal.
    pub fn with_resolver(
        config: SchedulerConfig,
        resolver: Arc<dyn PrincipalResolver>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            queue: Arc::new(ReadyQueue::new()),
            processing: DashMap::new(),
            history: HistoryBuffer::new(config.history_limit),
            metrics: RwLock::new(SchedulerMetrics::default()),
            pool_size: config.pool_size,
            active_workers: AtomicUsize::new(0),
            live_workers: Mutex::new(0),
            workers_exited: Condvar::new(),
            submitted: AtomicU64::new(0),
            deduplicated: AtomicU64::new(0),
        });

        let workers = spawn_workers(&config, &shared)?;

        info!(
            "Scheduler started with {} workers, history limit {}",
            config.pool_size, config.history_limit
        );

        Ok(Self {
            config,
            shared,
            next_id: AtomicU64::new(1),
            resolver,
            accepting: AtomicBool::new(true),
            workers: Mutex::new(workers),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    pub fn history_limit(&self) -> usize {
        self.shared.history.limit()
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        let mut metrics = self.shared.metrics.read().clone();
        metrics.tasks_pending = self.shared.queue.len_by_priority();
        let active = self.shared.active_workers.load(Ordering::Relaxed);
        metrics.worker_utilization = active as f64 / self.shared.pool_size as f64;
        metrics.total_submitted = self.shared.submitted.load(Ordering::Relaxed);
        metrics.total_deduplicated = self.shared.deduplicated.load(Ordering::Relaxed);
        metrics
    }
}

fn spawn_workers(
    config: &SchedulerConfig,
    shared: &Arc<Shared>,
) -> Result<Vec<JoinHandle<()>>, SchedulerError> {
    let mut handles = Vec::with_capacity(config.pool_size);
    for n in 0..config.pool_size {
        *shared.live_workers.lock() += 1;
        let worker_shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", config.thread_name_prefix, n))
            .spawn(move || worker_shared.worker_loop(n));

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                *shared.live_workers.lock() -= 1;
                error!(worker = n, error = %e, "failed to spawn worker thread");
                // Let the workers that did start wind down.
                shared.queue.close();
                return Err(SchedulerError::WorkerSpawn(e.to_string()));
            }
        }
    }
    Ok(handles)
}
