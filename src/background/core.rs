use crate::ids::TaskId;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub(crate) type TaskAction = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;
pub(crate) type CompleteHook = Box<dyn FnOnce() + Send>;
pub(crate) type ErrorHook = Box<dyn FnOnce(&TaskError) + Send>;

/// Why a detached task did not complete successfully
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task exceeded its time budget of {}ms", budget.as_millis())]
    TimedOut { budget: Duration },
}

/// Optional settings for [`BackgroundTasks::add_task`].
#[derive(Default)]
pub struct TaskOptions {
    pub(crate) name: Option<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) on_complete: Option<CompleteHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl TaskOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with just a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().name(name)
    }

    /// Label used in logs and events; generated when omitted
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Budget after which the task is reported as timed out and aborted
    #[must_use]
    pub fn timeout(mut self, budget: Duration) -> Self {
        self.timeout = Some(budget);
        self
    }

    /// Called once if the task succeeds
    #[must_use]
    pub fn on_complete(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Called once if the task fails, panics or times out
    #[must_use]
    pub fn on_error(mut self, hook: impl FnOnce(&TaskError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for TaskOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskOptions")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// A submitted task waiting for the response to be committed.
pub struct PendingTask {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) action: TaskAction,
    pub(crate) on_complete: Option<CompleteHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl PendingTask {
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Per-request queue behind the handler's background hook.
///
/// `add_task` only records the work; nothing runs until the pipeline hands
/// the queue to the [`super::TaskSupervisor`] after the response is encoded.
/// Cloning shares the same queue.
#[derive(Clone)]
pub struct BackgroundTasks {
    owner: Arc<str>,
    enabled: bool,
    queue: Arc<Mutex<Vec<PendingTask>>>,
}

impl BackgroundTasks {
    /// Queue for requests to `owner` (used to name anonymous tasks)
    pub fn new(owner: impl Into<Arc<str>>, enabled: bool) -> Self {
        Self {
            owner: owner.into(),
            enabled,
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A queue that accepts nothing
    #[must_use]
    pub fn disabled() -> Self {
        Self::new("", false)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a task and return immediately.
    pub fn add_task<F, Fut>(&self, action: F, options: TaskOptions) -> TaskId
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = TaskId::new();
        let mut queue = self.queue.lock();
        let name = options
            .name
            .unwrap_or_else(|| format!("{}#task-{}", self.owner, queue.len() + 1));
        let action: TaskAction = Box::new(move || -> BoxFuture<'static, anyhow::Result<()>> {
            Box::pin(action())
        });
        queue.push(PendingTask {
            id,
            name,
            timeout: options.timeout,
            action,
            on_complete: options.on_complete,
            on_error: options.on_error,
        });
        id
    }

    /// Number of queued tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Take every queued task, leaving the queue empty
    #[must_use]
    pub fn drain(&self) -> Vec<PendingTask> {
        std::mem::take(&mut *self.queue.lock())
    }
}

impl fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundTasks")
            .field("owner", &self.owner)
            .field("enabled", &self.enabled)
            .field("queued", &self.len())
            .finish()
    }
}
