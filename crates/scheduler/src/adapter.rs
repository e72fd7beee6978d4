//! Adapters that turn plain closures into [`Task`]s.
//!
//! Adapted tasks carry no category, take their title from the closure's
//! type name and are unkeyed, so each adapter instance is its own dedup
//! identity.

use std::any::type_name;
use std::sync::Arc;

use crate::error::TaskError;
use crate::task::{Task, TaskContext, TaskKey, TaskOutput, TaskStatus};

/// Wraps a fallible zero-argument closure.
pub struct CallableTask<F> {
    callable: F,
    title: String,
    key: TaskKey,
    status: TaskStatus,
}

impl<F, R, E> CallableTask<F>
where
    F: Fn() -> Result<R, E> + Send + Sync,
    R: Send + Sync + 'static,
    E: Into<anyhow::Error>,
{
    pub fn new(callable: F) -> Self {
        Self {
            callable,
            title: type_name::<F>().to_string(),
            key: TaskKey::Unkeyed,
            status: TaskStatus::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_key(mut self, key: impl Into<TaskKey>) -> Self {
        self.key = key.into();
        self
    }

    /// Finish building and erase the type, ready for submission.
    pub fn into_task(self) -> Arc<dyn Task>
    where
        F: 'static,
    {
        Arc::new(self)
    }
}

impl<F, R, E> Task for CallableTask<F>
where
    F: Fn() -> Result<R, E> + Send + Sync,
    R: Send + Sync + 'static,
    E: Into<anyhow::Error>,
{
    fn key(&self) -> TaskKey {
        self.key.clone()
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn status(&self) -> &TaskStatus {
        &self.status
    }

    fn compute(&self, _ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        match (self.callable)() {
            Ok(value) => Ok(Arc::new(value)),
            Err(e) => Err(TaskError::Other(e.into())),
        }
    }
}

/// Wraps a side-effecting closure and hands back a fixed value when it
/// returns.
pub struct ActionTask<F, V> {
    action: F,
    value: V,
    title: String,
    key: TaskKey,
    status: TaskStatus,
}

impl<F, V> ActionTask<F, V>
where
    F: Fn() + Send + Sync,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(action: F, value: V) -> Self {
        Self {
            action,
            value,
            title: type_name::<F>().to_string(),
            key: TaskKey::Unkeyed,
            status: TaskStatus::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_key(mut self, key: impl Into<TaskKey>) -> Self {
        self.key = key.into();
        self
    }

    pub fn into_task(self) -> Arc<dyn Task>
    where
        F: 'static,
    {
        Arc::new(self)
    }
}

impl<F, V> Task for ActionTask<F, V>
where
    F: Fn() + Send + Sync,
    V: Clone + Send + Sync + 'static,
{
    fn key(&self) -> TaskKey {
        self.key.clone()
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn status(&self) -> &TaskStatus {
        &self.status
    }

    fn compute(&self, _ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        (self.action)();
        Ok(Arc::new(self.value.clone()))
    }
}
