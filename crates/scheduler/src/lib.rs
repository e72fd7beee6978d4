//! Priority-aware background task scheduler.
//!
//! A fixed pool of worker threads pulls [`TaskDescriptor`]s off a
//! priority-ordered ready queue (`Highest` first, earliest submission
//! breaking ties), tracks each task through Awaiting → Processing →
//! Completed/Failed, and keeps a bounded history of finished tasks for
//! monitoring. [`Scheduler::submit_unique`] offers best-effort
//! deduplication of pending submissions.

pub mod adapter;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod history;
pub mod metrics;
pub mod principal;
pub mod queue;
pub mod runner;
pub mod snapshot;
pub mod task;
pub mod types;

pub use adapter::{ActionTask, CallableTask};
pub use config::SchedulerConfig;
pub use descriptor::{TaskDescriptor, TaskResult};
pub use error::{SchedulerError, TaskError};
pub use metrics::SchedulerMetrics;
pub use principal::{Anonymous, PrincipalResolver};
pub use runner::Scheduler;
pub use snapshot::{display_order, execution_order, history_order, TaskSnapshot};
pub use task::{same_task, Task, TaskContext, TaskKey, TaskOutput, TaskStatus};
pub use types::{TaskPriority, TaskState};
