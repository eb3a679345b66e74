use super::core::{CompleteHook, ErrorHook, PendingTask, TaskError};
use crate::config::EngineConfig;
use crate::error::panic_message;
use crate::ids::TaskId;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, warn};

/// Supervisor settings, usually derived from [`EngineConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Running time after which a task is reported as slow (it keeps running)
    pub slow_threshold: Duration,
    /// Budget for tasks submitted without their own
    pub default_timeout: Option<Duration>,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for SupervisorConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            slow_threshold: config.slow_task_threshold(),
            default_timeout: config.default_task_timeout(),
            event_capacity: config.task_event_capacity,
        }
    }
}

/// Lifecycle notifications published by the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Started {
        id: TaskId,
        name: Arc<str>,
    },
    Slow {
        id: TaskId,
        name: Arc<str>,
        elapsed: Duration,
        threshold: Duration,
    },
    Completed {
        id: TaskId,
        name: Arc<str>,
        elapsed: Duration,
    },
    Failed {
        id: TaskId,
        name: Arc<str>,
        error: TaskError,
        elapsed: Duration,
    },
}

impl TaskEvent {
    #[must_use]
    pub fn id(&self) -> TaskId {
        match self {
            TaskEvent::Started { id, .. }
            | TaskEvent::Slow { id, .. }
            | TaskEvent::Completed { id, .. }
            | TaskEvent::Failed { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TaskEvent::Started { name, .. }
            | TaskEvent::Slow { name, .. }
            | TaskEvent::Completed { name, .. }
            | TaskEvent::Failed { name, .. } => name,
        }
    }
}

/// Counters observed through [`TaskSupervisor::progress`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskProgress {
    /// Tasks finished (success or failure) since the last reset
    pub completed: u64,
    /// Tasks submitted and not yet finished
    pub in_flight: usize,
}

struct SupervisorInner {
    config: SupervisorConfig,
    events: broadcast::Sender<TaskEvent>,
    progress: watch::Sender<TaskProgress>,
}

impl SupervisorInner {
    fn publish(&self, event: TaskEvent) {
        // No receivers is fine: events are optional observability
        self.events.send(event).ok();
    }
}

/// Runs detached work after responses are committed.
///
/// Every task runs on its own tokio task, so a failing, panicking or slow
/// task cannot affect its siblings or the request that submitted it.
/// Cloning shares the same supervisor.
#[derive(Clone)]
pub struct TaskSupervisor {
    inner: Arc<SupervisorInner>,
}

impl TaskSupervisor {
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (progress, _) = watch::channel(TaskProgress::default());
        Self {
            inner: Arc::new(SupervisorInner {
                config,
                events,
                progress,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Start every task and return without waiting for any of them.
    ///
    /// Returns the number of tasks started.
    pub fn submit(&self, tasks: Vec<PendingTask>) -> usize {
        if tasks.is_empty() {
            return 0;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                error!(error = %err, tasks = tasks.len(), "No tokio runtime; background tasks rejected");
                for task in tasks {
                    self.inner
                        .progress
                        .send_modify(|p| p.in_flight += 1);
                    let PendingTask {
                        id,
                        name,
                        on_complete,
                        on_error,
                        ..
                    } = task;
                    finish(
                        &self.inner,
                        id,
                        &Arc::from(name),
                        Err(TaskError::Failed("no async runtime available".to_string())),
                        Duration::ZERO,
                        on_complete,
                        on_error,
                    );
                }
                return 0;
            }
        };

        let count = tasks.len();
        for task in tasks {
            self.inner.progress.send_modify(|p| p.in_flight += 1);
            runtime.spawn(run_task(Arc::clone(&self.inner), task));
        }
        debug!(tasks = count, "Background tasks submitted");
        count
    }

    /// Subscribe to task events published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn progress(&self) -> TaskProgress {
        *self.inner.progress.borrow()
    }

    /// Tasks finished since the last [`reset`](Self::reset)
    #[must_use]
    pub fn completed_count(&self) -> u64 {
        self.progress().completed
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.progress().in_flight
    }

    /// Zero the completion counter
    pub fn reset(&self) {
        self.inner.progress.send_modify(|p| p.completed = 0);
    }

    /// Wait until at least `n` tasks have completed since the last reset.
    pub async fn wait_for_completed(&self, n: u64) {
        let mut rx = self.inner.progress.subscribe();
        let reached = rx.wait_for(|p| p.completed >= n).await.map(|_| ());
        if let Err(err) = reached {
            debug!(error = %err, "Task progress channel closed");
        }
    }

    /// Wait until no task is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.progress.subscribe();
        let reached = rx.wait_for(|p| p.in_flight == 0).await.map(|_| ());
        if let Err(err) = reached {
            debug!(error = %err, "Task progress channel closed");
        }
    }
}

impl std::fmt::Debug for TaskSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSupervisor")
            .field("config", &self.inner.config)
            .field("progress", &self.progress())
            .finish()
    }
}

async fn run_task(inner: Arc<SupervisorInner>, task: PendingTask) {
    let PendingTask {
        id,
        name,
        timeout,
        action,
        on_complete,
        on_error,
    } = task;
    let name: Arc<str> = Arc::from(name);
    let threshold = inner.config.slow_threshold;
    let budget = timeout.or(inner.config.default_timeout);

    debug!(task_id = %id, task_name = %name, "Background task started");
    inner.publish(TaskEvent::Started {
        id,
        name: Arc::clone(&name),
    });

    let started = Instant::now();
    // Closure runs inside the spawned task: a panic before the future exists is a JoinError too
    let mut work = tokio::spawn(async move { action().await });
    let slow = tokio::time::sleep(threshold);
    tokio::pin!(slow);
    let deadline = async move {
        match budget {
            Some(budget) => tokio::time::sleep(budget).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut warned = false;
    let outcome = loop {
        tokio::select! {
            joined = &mut work => {
                break match joined {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(TaskError::Failed(format!("{err:#}"))),
                    Err(join_err) if join_err.is_panic() => {
                        Err(TaskError::Panicked(panic_message(join_err.into_panic().as_ref())))
                    }
                    Err(join_err) => Err(TaskError::Failed(join_err.to_string())),
                };
            }
            () = &mut slow, if !warned => {
                warned = true;
                let elapsed = started.elapsed();
                warn!(
                    task_id = %id,
                    task_name = %name,
                    threshold_ms = threshold.as_millis() as u64,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Background task exceeded slow threshold"
                );
                inner.publish(TaskEvent::Slow {
                    id,
                    name: Arc::clone(&name),
                    elapsed,
                    threshold,
                });
            }
            () = &mut deadline => {
                work.abort();
                break Err(TaskError::TimedOut {
                    budget: budget.unwrap_or_default(),
                });
            }
        }
    };

    finish(
        &inner,
        id,
        &name,
        outcome,
        started.elapsed(),
        on_complete,
        on_error,
    );
}

fn finish(
    inner: &SupervisorInner,
    id: TaskId,
    name: &Arc<str>,
    outcome: Result<(), TaskError>,
    elapsed: Duration,
    on_complete: Option<CompleteHook>,
    on_error: Option<ErrorHook>,
) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match outcome {
        Ok(()) => {
            debug!(task_id = %id, task_name = %name, elapsed_ms, "Background task completed");
            if let Some(hook) = on_complete {
                run_observer(name, "on_complete", hook);
            }
            inner.publish(TaskEvent::Completed {
                id,
                name: Arc::clone(name),
                elapsed,
            });
        }
        Err(err) => {
            error!(
                task_id = %id,
                task_name = %name,
                error = %err,
                elapsed_ms,
                "Background task failed"
            );
            if let Some(hook) = on_error {
                let reported = err.clone();
                run_observer(name, "on_error", move || hook(&reported));
            }
            inner.publish(TaskEvent::Failed {
                id,
                name: Arc::clone(name),
                error: err,
                elapsed,
            });
        }
    }
    inner.progress.send_modify(|p| {
        p.completed += 1;
        p.in_flight = p.in_flight.saturating_sub(1);
    });
}

fn run_observer(task_name: &str, observer: &'static str, hook: impl FnOnce()) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(hook)) {
        let message = panic_message(panic.as_ref());
        warn!(task_name, observer, panic = %message, "Task observer panicked");
    }
}
