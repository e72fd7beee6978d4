//! taskdeck-demo: runs a synthetic workload through the scheduler and
//! prints the resulting history and metrics.
//!
//! Config resolution: `--config` TOML file if given, otherwise defaults;
//! `TASKDECK_*` env vars (and `.env`) override either; CLI flags win last.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use taskdeck_scheduler::{
    Scheduler, SchedulerConfig, Task, TaskContext, TaskError, TaskKey, TaskOutput, TaskPriority,
    TaskSnapshot, TaskStatus,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Priority task scheduler demo.
#[derive(Parser, Debug)]
#[command(name = "taskdeck-demo", version, about)]
struct Cli {
    /// Path to a scheduler TOML config file.
    #[arg(long, env = "TASKDECK_CONFIG")]
    config: Option<String>,

    /// Override the number of worker threads.
    #[arg(long)]
    pool_size: Option<usize>,

    /// Override the history buffer capacity.
    #[arg(long)]
    history_limit: Option<usize>,

    /// Number of synthetic tasks to submit.
    #[arg(long, default_value_t = 20)]
    tasks: usize,

    /// Make every K-th task fail (0 disables failures).
    #[arg(long, default_value_t = 7)]
    fail_every: usize,

    /// Print history and metrics as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

// ── Workload ────────────────────────────────────────────────────────

/// Synthetic report job: a few steps with progress updates.
struct ReportTask {
    title: String,
    key: TaskKey,
    steps: u32,
    fail: bool,
    status: TaskStatus,
}

impl Task for ReportTask {
    fn key(&self) -> TaskKey {
        self.key.clone()
    }

    fn category(&self) -> Option<&str> {
        Some("report")
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn status(&self) -> &TaskStatus {
        &self.status
    }

    fn compute(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        for step in 1..=self.steps {
            ctx.check_interrupted()?;
            self.set_status_line(&format!("step {step}/{}", self.steps));
            thread::sleep(Duration::from_millis(5));
            self.set_progress(i64::from(step * 100 / self.steps));
        }
        if self.fail {
            return Err(TaskError::failed(format!("{} hit a bad row", self.title)));
        }
        Ok(Arc::new(self.steps))
    }
}

fn print_table(history: &[TaskSnapshot]) {
    println!(
        "{:>5}  {:<8}  {:<10}  {:<10}  {:>4}  {:>8}  {}",
        "ID", "PRIO", "KEY", "STATE", "PCT", "MS", "TITLE"
    );
    for s in history {
        let ms = s
            .elapsed()
            .map(|d| d.num_milliseconds().to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>5}  {:<8}  {:<10}  {:<10}  {:>4}  {:>8}  {}",
            s.id,
            s.priority.to_string(),
            s.key.to_string(),
            s.state.to_string(),
            s.progress,
            ms,
            s.title
        );
    }
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => SchedulerConfig::from_env().context("invalid scheduler config from env")?,
    };
    if let Some(pool_size) = cli.pool_size {
        config.pool_size = pool_size;
    }
    if let Some(history_limit) = cli.history_limit {
        config.history_limit = history_limit;
    }
    let shutdown_timeout = config.shutdown_timeout();

    let scheduler = Scheduler::new(config).context("failed to start scheduler")?;

    let mut accepted = Vec::new();
    for n in 0..cli.tasks {
        let task = Arc::new(ReportTask {
            title: format!("report #{n}"),
            key: TaskKey::from(format!("r{}", n % 12)),
            steps: 3 + (n % 4) as u32,
            fail: cli.fail_every > 0 && n % cli.fail_every == cli.fail_every - 1,
            status: TaskStatus::new(),
        });
        let priority = TaskPriority::ALL[n % TaskPriority::ALL.len()];
        if let Some(descriptor) = scheduler.submit_unique(task, Some(priority))? {
            accepted.push(descriptor);
        }
    }
    info!(
        submitted = cli.tasks,
        accepted = accepted.len(),
        queued = scheduler.queued_len(),
        "workload submitted"
    );

    for descriptor in &accepted {
        if let Err(e) = descriptor.get() {
            warn!(id = descriptor.id(), error = %e, "task did not complete");
        }
    }

    scheduler.shutdown(true);
    if !scheduler.await_termination(shutdown_timeout) {
        let abandoned = scheduler.shutdown(false);
        warn!(abandoned = abandoned.len(), "workers did not stop in time; forced shutdown");
    }
    scheduler.join()?;

    let mut history = scheduler.collect_history();
    history.sort_by(taskdeck_scheduler::history_order);
    let metrics = scheduler.metrics();

    if cli.json {
        let out = serde_json::json!({ "history": history, "metrics": metrics });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_table(&history);
        println!();
        println!(
            "completed: {}  failed: {}  deduplicated: {}",
            metrics.total_completed(),
            metrics.total_failed(),
            metrics.total_deduplicated
        );
    }

    Ok(())
}
