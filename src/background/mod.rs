//! # Background Module
//!
//! Detached work submitted by handlers. The flow has two halves:
//!
//! 1. **Queueing** - during the handler, [`BackgroundTasks::add_task`] records
//!    a [`PendingTask`] and returns at once. Nothing runs yet.
//! 2. **Supervision** - once the response is encoded, the pipeline drains the
//!    queue into the [`TaskSupervisor`], which spawns each task on its own
//!    tokio task.
//!
//! ## Guarantees
//!
//! - The response never waits for a task.
//! - A failing or panicking task is logged with its name and routed to its
//!   `on_error` observer; siblings and the originating request are unaffected.
//! - A task running longer than the slow threshold produces a warning and a
//!   [`TaskEvent::Slow`], and keeps running.
//! - A task exceeding its time budget is aborted and reported as
//!   [`TaskError::TimedOut`].
//! - `on_complete` / `on_error` run at most once.
//! - [`TaskSupervisor::completed_count`] counts finished tasks since the last
//!   [`TaskSupervisor::reset`].
//!
//! ```rust
//! use brrtapi::background::{BackgroundTasks, SupervisorConfig, TaskOptions, TaskSupervisor};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let supervisor = TaskSupervisor::new(SupervisorConfig::default());
//! let tasks = BackgroundTasks::new("POST /signup", true);
//! tasks.add_task(|| async { Ok(()) }, TaskOptions::named("send-welcome-email"));
//!
//! supervisor.submit(tasks.drain());
//! supervisor.wait_for_completed(1).await;
//! assert_eq!(supervisor.completed_count(), 1);
//! # }
//! ```

mod core;
mod supervisor;

pub use core::{BackgroundTasks, PendingTask, TaskError, TaskOptions};
pub use supervisor::{SupervisorConfig, TaskEvent, TaskProgress, TaskSupervisor};
