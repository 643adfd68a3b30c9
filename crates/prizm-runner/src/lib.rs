//! Prizm Runners
//!
//! The orchestration core of the Prizm backend: a durable, resumable,
//! multi-step workflow engine plus a single-step task engine, both built
//! on the injected [`RunStore`](prizm_store::RunStore) and
//! [`StepExecutor`](prizm_executor::StepExecutor).
//!
//! - [`WorkflowRunner`] drives a named pipeline of steps with condition
//!   checks, implicit input piping, retry, pause/resume at approve steps,
//!   cancellation, and per-step plus total timeouts. Progress is persisted
//!   after every transition, so a paused run can be resumed after a
//!   process restart.
//! - [`TaskRunner`] runs one-off jobs (fire-and-forget or synchronous)
//!   with a background watchdog that reclaims executions whose executor
//!   never returns.
//!
//! Construct one of each per process and inject them where needed; both
//! expose `shutdown()` to release the watchdog and cancel in-flight work.
//!
//! Steps within one run are strictly sequential. Different runs and tasks
//! proceed fully concurrently, each as an independent spawned future with
//! its own cancellation token.

mod error;
mod events;
mod interfaces;
mod retry;
mod runner;
mod task;
mod workspace;

pub use error::RunnerError;
pub use events::{ChannelNotifier, EventNotifier, NoopNotifier, RunEvent};
pub use interfaces::{
  BoxError, DefinitionStore, LinkedActionDispatcher, RunLogSink, RunSnapshot,
};
pub use runner::{
  CANCELLED_BY_USER, RunOptions, RunResult, TRUNCATION_MARKER, WorkflowRunner,
};
pub use task::{TaskOptions, TaskRunner, TaskRunnerConfig, WATCHDOG_TIMEOUT_ERROR};
pub use workspace::{META_DIR, WorkspacePaths, clean_workspace, resolve_workspace};
