use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::adapter::CallableTask;
use crate::config::SchedulerConfig;
use crate::descriptor::TaskDescriptor;
use crate::error::{SchedulerError, TaskError};
use crate::principal::PrincipalResolver;
use crate::runner::Scheduler;
use crate::task::{Task, TaskContext, TaskKey, TaskOutput, TaskStatus};
use crate::types::{TaskPriority, TaskState};

const WAIT: Duration = Duration::from_secs(5);

fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met within {:?}", WAIT);
        thread::sleep(Duration::from_millis(2));
    }
}

/// Latch a test opens to let gated tasks finish.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    /// Wait until opened; gives up early if the context is interrupted.
    fn pass(&self, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        let mut open = self.open.lock().unwrap();
        while !*open {
            ctx.check_interrupted()?;
            open = self.cv.wait_timeout(open, Duration::from_millis(5)).unwrap().0;
        }
        Ok(())
    }
}

/// Mock task: optionally blocks on a gate, then records its title.
struct MockTask {
    title: String,
    key: TaskKey,
    category: Option<String>,
    gate: Option<Arc<Gate>>,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
    status: TaskStatus,
}

impl MockTask {
    fn new(title: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            title: title.to_string(),
            key: TaskKey::Unkeyed,
            category: None,
            gate: None,
            log: Arc::clone(log),
            fail: false,
            status: TaskStatus::new(),
        }
    }

    fn keyed(mut self, key: &str) -> Self {
        self.key = key.into();
        self
    }

    fn gated(mut self, gate: &Arc<Gate>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }

    fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn arc(self) -> Arc<dyn Task> {
        Arc::new(self)
    }
}

impl Task for MockTask {
    fn key(&self) -> TaskKey {
        self.key.clone()
    }
    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn status(&self) -> &TaskStatus {
        &self.status
    }
    fn compute(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        self.set_status_line("running");
        if let Some(gate) = &self.gate {
            gate.pass(ctx)?;
        }
        self.log.lock().unwrap().push(self.title.clone());
        self.set_progress(100);
        if self.fail {
            return Err(TaskError::failed(format!("{} exploded", self.title)));
        }
        Ok(Arc::new(self.title.clone()))
    }
}

fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Occupy the single worker of `scheduler` with a gated task.
fn block_worker(scheduler: &Scheduler, gate: &Arc<Gate>) -> Arc<TaskDescriptor> {
    let log = new_log();
    let blocker = scheduler
        .submit(MockTask::new("blocker", &log).gated(gate).arc(), Some(TaskPriority::Highest))
        .unwrap();
    wait_for(|| {
        blocker.state() == TaskState::Processing && blocker.task().status_line() == "running"
    });
    blocker
}

#[test]
fn scheduler_creation() {
    let scheduler = Scheduler::with_pool(2, 10).unwrap();
    assert_eq!(scheduler.pool_size(), 2);
    assert_eq!(scheduler.history_limit(), 10);
    assert!(!scheduler.is_shutdown());
    assert!(scheduler.collect_queued().is_empty());
    assert!(scheduler.collect_history().is_empty());
}

#[test]
fn zero_pool_is_rejected() {
    let err = Scheduler::with_pool(0, 10).err().unwrap();
    assert!(matches!(err, SchedulerError::Config(_)));
}

#[test]
fn dispatches_by_priority_regardless_of_submission_order() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    let blocker = block_worker(&scheduler, &gate);

    let log = new_log();
    let t1 = scheduler.submit(MockTask::new("T1", &log).arc(), Some(TaskPriority::Low)).unwrap();
    let t2 = scheduler.submit(MockTask::new("T2", &log).arc(), Some(TaskPriority::High)).unwrap();
    let t3 = scheduler.submit(MockTask::new("T3", &log).arc(), Some(TaskPriority::Medium)).unwrap();

    gate.open();
    for d in [&blocker, &t1, &t2, &t3] {
        d.get().unwrap();
    }

    assert_eq!(*log.lock().unwrap(), vec!["T2", "T3", "T1"]);
}

#[test]
fn equal_priority_runs_in_submission_order() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    block_worker(&scheduler, &gate);

    let log = new_log();
    let handles: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|t| scheduler.submit(MockTask::new(t, &log).arc(), None).unwrap())
        .collect();
    assert!(handles.iter().all(|d| d.priority() == TaskPriority::Medium));

    gate.open();
    for d in &handles {
        d.get().unwrap();
    }
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d"]);
}

#[test]
fn collect_queued_reports_dispatch_order() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    let blocker = block_worker(&scheduler, &gate);

    let log = new_log();
    let low = scheduler.submit(MockTask::new("low", &log).arc(), Some(TaskPriority::Lowest)).unwrap();
    let high = scheduler.submit(MockTask::new("high", &log).arc(), Some(TaskPriority::High)).unwrap();

    let queued = scheduler.collect_queued();
    let ids: Vec<u64> = queued.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![high.id(), low.id()]);
    assert!(queued.iter().all(|s| s.state == TaskState::Awaiting && s.start_time.is_none()));

    let processing = scheduler.collect_processing();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, blocker.id());
    assert_eq!(processing[0].state, TaskState::Processing);
    assert_eq!(processing[0].status_line, "running");

    // Merged view: awaiting (by priority) before processing.
    let active: Vec<u64> = scheduler.collect_active().iter().map(|s| s.id).collect();
    assert_eq!(active, vec![high.id(), low.id(), blocker.id()]);

    gate.open();
    low.get().unwrap();
}

#[test]
fn concurrent_submitters_get_unique_increasing_ids() {
    let scheduler = Arc::new(Scheduler::with_pool(2, 0).unwrap());
    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                let mut ids = Vec::new();
                for _ in 0..50 {
                    let task = CallableTask::new(|| Ok::<_, anyhow::Error>(())).into_task();
                    ids.push(scheduler.submit(task, None).unwrap().id());
                }
                ids
            })
        })
        .collect();

    let mut all = HashSet::new();
    for s in submitters {
        let ids = s.join().unwrap();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids not increasing: {:?}", ids);
        for id in ids {
            assert!(all.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(all.len(), 400);
    assert_eq!(scheduler.metrics().total_submitted, 400);
}

#[test]
fn finished_task_leaves_processing_and_enters_history_once() {
    let scheduler = Scheduler::with_pool(2, 10).unwrap();
    let log = new_log();
    let d = scheduler.submit(MockTask::new("once", &log).arc(), None).unwrap();

    let value = d.get_as::<String>().unwrap().unwrap();
    assert_eq!(value.as_str(), "once");
    assert_eq!(d.state(), TaskState::Completed);
    assert!(d.start_time().is_some());
    assert!(d.finish_time() >= d.start_time());

    assert!(scheduler.collect_processing().iter().all(|s| s.id != d.id()));
    let history = scheduler.collect_history();
    let hits: Vec<_> = history.iter().filter(|s| s.id == d.id()).collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].state, TaskState::Completed);
    assert_eq!(hits[0].progress, 100);
    assert_eq!(hits[0].title, "once");
}

#[test]
fn history_is_bounded_and_evicts_oldest() {
    let scheduler = Scheduler::with_pool(1, 3).unwrap();
    let log = new_log();
    let mut ids = Vec::new();
    for n in 0..5 {
        let d = scheduler
            .submit(MockTask::new(&format!("job-{n}"), &log).arc(), None)
            .unwrap();
        d.get().unwrap();
        ids.push(d.id());
        assert!(scheduler.history_len() <= 3);
    }

    let history: Vec<u64> = scheduler.collect_history().iter().map(|s| s.id).collect();
    assert_eq!(history, ids[2..].to_vec());
}

#[test]
fn zero_history_limit_keeps_nothing() {
    let scheduler = Scheduler::with_pool(1, 0).unwrap();
    let log = new_log();
    scheduler.submit(MockTask::new("x", &log).arc(), None).unwrap().get().unwrap();
    assert!(scheduler.collect_history().is_empty());
}

#[test]
fn submit_unique_only_dedups_against_ready_queue() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let blocker_gate = Gate::new();
    block_worker(&scheduler, &blocker_gate);

    let log = new_log();
    let first_gate = Gate::new();
    let first = scheduler
        .submit_unique(MockTask::new("first", &log).keyed("nightly").gated(&first_gate).arc(), None)
        .unwrap()
        .expect("first submission must be accepted");

    let second = scheduler
        .submit_unique(MockTask::new("second", &log).keyed("nightly").arc(), None)
        .unwrap();
    assert!(second.is_none(), "equal key still queued must be rejected");

    // Let `first` start; it is now PROCESSING and no longer in the queue.
    blocker_gate.open();
    wait_for(|| first.state() == TaskState::Processing);

    let third = scheduler
        .submit_unique(MockTask::new("third", &log).keyed("nightly").arc(), None)
        .unwrap();
    assert!(third.is_some(), "dedup must not consider processing tasks");

    first_gate.open();
    first.get().unwrap();
    third.unwrap().get().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["first", "third"]);
    assert_eq!(scheduler.metrics().total_deduplicated, 1);
}

#[test]
fn submit_unique_never_collides_unkeyed_tasks() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    block_worker(&scheduler, &gate);

    let log = new_log();
    let a = scheduler.submit_unique(MockTask::new("a", &log).arc(), None).unwrap();
    let b = scheduler.submit_unique(MockTask::new("b", &log).arc(), None).unwrap();
    assert!(a.is_some());
    assert!(b.is_some());

    // Resubmitting the very same object is a duplicate.
    let shared = MockTask::new("c", &log).arc();
    assert!(scheduler.submit_unique(Arc::clone(&shared), None).unwrap().is_some());
    assert!(scheduler.submit_unique(shared, None).unwrap().is_none());

    gate.open();
}

#[test]
fn failures_do_not_stop_the_worker() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    block_worker(&scheduler, &gate);

    let log = new_log();
    let failing = scheduler
        .submit(MockTask::new("bad", &log).category("etl").failing().arc(), None)
        .unwrap();
    let panicking = scheduler
        .submit(
            CallableTask::new(|| -> anyhow::Result<()> { panic!("kaboom") }).into_task(),
            None,
        )
        .unwrap();
    let healthy = scheduler
        .submit(MockTask::new("good", &log).category("etl").arc(), None)
        .unwrap();

    gate.open();

    let err = failing.get().unwrap_err();
    assert!(matches!(*err, TaskError::Failed(_)));
    assert_eq!(err.to_string(), "task failed: bad exploded");
    assert_eq!(failing.state(), TaskState::Failed);

    let err = panicking.get().unwrap_err();
    assert!(matches!(&*err, TaskError::Panicked(msg) if msg == "kaboom"));
    assert_eq!(panicking.state(), TaskState::Failed);

    assert!(healthy.get().is_ok());
    assert_eq!(healthy.state(), TaskState::Completed);

    let metrics = scheduler.metrics();
    assert_eq!(metrics.tasks_failed["etl"], 1);
    assert_eq!(metrics.tasks_completed["etl"], 1);
    assert_eq!(metrics.total_failed(), 2);

    let failed_in_history = scheduler
        .collect_history()
        .iter()
        .filter(|s| s.state == TaskState::Failed)
        .count();
    assert_eq!(failed_in_history, 2);
}

/// Task whose status accessor panics once its body has run.
struct BrokenStatusTask {
    ran: AtomicBool,
    status: TaskStatus,
}

impl Task for BrokenStatusTask {
    fn title(&self) -> &str {
        "broken status"
    }
    fn status(&self) -> &TaskStatus {
        &self.status
    }
    fn status_line(&self) -> String {
        if self.ran.load(Ordering::SeqCst) {
            panic!("status unavailable");
        }
        self.status().status_line()
    }
    fn compute(&self, _ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        self.ran.store(true, Ordering::SeqCst);
        Ok(Arc::new(5u8))
    }
}

#[test]
fn panicking_metadata_accessor_still_resolves() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let broken = scheduler
        .submit(
            Arc::new(BrokenStatusTask {
                ran: AtomicBool::new(false),
                status: TaskStatus::new(),
            }),
            None,
        )
        .unwrap();

    let value = broken
        .get_timeout(WAIT)
        .expect("descriptor was never resolved")
        .unwrap();
    assert_eq!(*value.downcast::<u8>().unwrap(), 5);
    assert_eq!(broken.state(), TaskState::Completed);
    assert_eq!(scheduler.processing_len(), 0);

    let history = scheduler.collect_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, broken.id());
    assert_eq!(history[0].state, TaskState::Completed);
    assert!(history[0].finish_time.is_some());

    // The worker survived and keeps dispatching.
    let log = new_log();
    let next = scheduler.submit(MockTask::new("after", &log).arc(), None).unwrap();
    assert!(next.get_timeout(WAIT).expect("worker stopped").is_ok());
    assert_eq!(scheduler.metrics().total_completed(), 2);
}

#[test]
fn cancel_awaiting_task_removes_it_from_queue() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    block_worker(&scheduler, &gate);

    let log = new_log();
    let doomed = scheduler.submit(MockTask::new("doomed", &log).arc(), None).unwrap();
    let kept = scheduler.submit(MockTask::new("kept", &log).arc(), None).unwrap();

    assert!(doomed.cancel());
    assert!(doomed.is_cancelled());
    assert!(doomed.is_done());
    assert!(matches!(*doomed.get().unwrap_err(), TaskError::Cancelled));
    assert!(!doomed.cancel());
    assert_eq!(scheduler.queued_len(), 1);

    gate.open();
    kept.get().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    assert_eq!(doomed.state(), TaskState::Awaiting);
    assert!(scheduler.collect_history().iter().all(|s| s.id != doomed.id()));
}

#[test]
fn cancel_processing_task_is_best_effort_interrupt() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    let running = block_worker(&scheduler, &gate);

    assert!(!running.cancel());
    assert!(running.is_interrupted());

    // The gate honors interruption, so the task stops on its own.
    let err = running.get().unwrap_err();
    assert!(matches!(*err, TaskError::Interrupted));
    assert_eq!(running.state(), TaskState::Failed);
    assert_eq!(scheduler.processing_len(), 0);
}

#[test]
fn owner_comes_from_principal_resolver() {
    let resolver: Arc<dyn PrincipalResolver> = Arc::new(|| Some("alice".to_string()));
    let scheduler = Scheduler::with_resolver(SchedulerConfig::new(1, 10), resolver).unwrap();
    let log = new_log();
    let d = scheduler.submit(MockTask::new("owned", &log).arc(), None).unwrap();
    assert_eq!(d.owner(), Some("alice"));
    d.get().unwrap();
    assert_eq!(scheduler.collect_history()[0].owner.as_deref(), Some("alice"));

    let anonymous = Scheduler::with_pool(1, 10).unwrap();
    let d = anonymous.submit(MockTask::new("anon", &log).arc(), None).unwrap();
    assert_eq!(d.owner(), None);
}

#[test]
fn graceful_shutdown_drains_queue() {
    let scheduler = Scheduler::with_pool(2, 50).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let counter = Arc::clone(&counter);
        let task = CallableTask::new(move || {
            thread::sleep(Duration::from_millis(1));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(())
        })
        .into_task();
        scheduler.submit(task, Some(TaskPriority::Low)).unwrap();
    }

    assert!(scheduler.shutdown(true).is_empty());
    assert!(scheduler.is_shutdown());
    scheduler.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 20);
    assert_eq!(scheduler.history_len(), 20);
    assert_eq!(scheduler.processing_len(), 0);
    assert!(scheduler.await_termination(Duration::from_millis(10)));

    let late = CallableTask::new(|| Ok::<_, anyhow::Error>(())).into_task();
    assert!(matches!(scheduler.submit(late, None), Err(SchedulerError::ShutDown)));
}

#[test]
fn forced_shutdown_abandons_queue_and_interrupts_running() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    let running = block_worker(&scheduler, &gate);

    let log = new_log();
    let queued: Vec<_> = (0..3)
        .map(|n| scheduler.submit(MockTask::new(&format!("q{n}"), &log).arc(), None).unwrap())
        .collect();

    let abandoned = scheduler.shutdown(false);
    let abandoned_ids: Vec<u64> = abandoned.iter().map(|d| d.id()).collect();
    let queued_ids: Vec<u64> = queued.iter().map(|d| d.id()).collect();
    assert_eq!(abandoned_ids, queued_ids);

    for d in &queued {
        assert!(matches!(*d.get().unwrap_err(), TaskError::Cancelled));
        assert_eq!(d.state(), TaskState::Awaiting);
    }

    assert!(matches!(*running.get().unwrap_err(), TaskError::Interrupted));
    assert!(scheduler.await_termination(WAIT));
    scheduler.join().unwrap();

    assert_eq!(scheduler.processing_len(), 0);
    assert_eq!(scheduler.queued_len(), 0);
    let history: Vec<u64> = scheduler.collect_history().iter().map(|s| s.id).collect();
    assert_eq!(history, vec![running.id()]);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn await_termination_times_out_while_running() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    block_worker(&scheduler, &gate);

    scheduler.shutdown_graceful();
    assert!(!scheduler.await_termination(Duration::from_millis(20)));
    gate.open();
    assert!(scheduler.await_termination(WAIT));
}

#[test]
fn await_termination_with_unbounded_wait() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    block_worker(&scheduler, &gate);
    scheduler.shutdown_graceful();

    let opener = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            gate.open();
        })
    };
    assert!(scheduler.await_termination(Duration::MAX));
    opener.join().unwrap();

    // Already terminated: returns straight away.
    assert!(scheduler.await_termination(Duration::MAX));
    scheduler.join().unwrap();
}

#[test]
fn inspection_returns_independent_copies() {
    let scheduler = Scheduler::with_pool(1, 10).unwrap();
    let gate = Gate::new();
    let running = block_worker(&scheduler, &gate);

    let before = scheduler.collect_processing();
    running.task().set_progress(60);
    running.task().set_status_line("halfway");
    let after = scheduler.collect_processing();

    assert_eq!(before[0].progress, 0);
    assert_eq!(before[0].status_line, "running");
    assert_eq!(after[0].progress, 60);
    assert_eq!(after[0].status_line, "halfway");
    gate.open();
}
