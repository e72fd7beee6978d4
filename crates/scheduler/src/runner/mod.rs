//! Scheduler runner -- owns the worker pool and drives task lifecycles.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, construction, worker spawning and accessors
//! - `submission`: `submit` and the best-effort `submit_unique`
//! - `execution`: worker dispatch loop and the before/after lifecycle hooks
//! - `inspection`: point-in-time queued/processing/history views
//! - `shutdown`: graceful and forced shutdown, joining workers

mod core;
mod execution;
mod inspection;
mod shutdown;
mod submission;
#[cfg(test)]
mod tests;

pub use self::core::Scheduler;
