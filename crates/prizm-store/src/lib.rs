//! Prizm Run Store
//!
//! Durable CRUD and crash recovery for the two run families:
//! [`WorkflowRun`] (multi-step) and [`TaskRun`] (single-step). No business
//! logic lives here; the store is a pure persistence contract.
//!
//! Two guarantees matter to the runners:
//! - updates through [`RunStore::update_workflow_run`] /
//!   [`RunStore::mark_task_terminal`] never overwrite a record that has
//!   already reached a terminal status - the per-record compare-and-set
//!   that keeps a cancel from racing a step-completion write;
//! - `paused` runs survive restart untouched, while `running`/`pending`
//!   records are unconditionally failed by the startup sweep (in-memory
//!   execution context cannot survive the process).

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use sqlx::types::Json;
pub use types::{
  RunStatus, StepResult, StepStatus, TaskFilter, TaskRun, TaskStatus, TriggerType, WorkflowRun,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Marker error written by the startup recovery sweep.
pub const RESTART_INTERRUPTED_ERROR: &str = "Interrupted by server restart";

/// Marker error written by the age-based recovery sweep.
pub const AGE_EXCEEDED_ERROR: &str = "Exceeded maximum age for an active run";

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Storage trait for workflow and task runs.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Create a new workflow run record.
  async fn create_workflow_run(&self, run: &WorkflowRun) -> Result<(), Error>;

  /// Get a workflow run by id.
  async fn get_workflow_run(&self, run_id: &str) -> Result<Option<WorkflowRun>, Error>;

  /// Find the run holding a resume token.
  async fn find_by_resume_token(&self, token: &str) -> Result<Option<WorkflowRun>, Error>;

  /// Persist the run's current state. Returns false when the stored record
  /// is absent or already terminal - the write does not land in that case.
  async fn update_workflow_run(&self, run: &WorkflowRun) -> Result<bool, Error>;

  /// Atomically move a paused run to `running`, consuming `token` and
  /// persisting the run's current state. Returns false when the token has
  /// already been claimed or the run is no longer paused; at most one
  /// caller per token observes true.
  async fn claim_paused_run(&self, run: &WorkflowRun, token: &str) -> Result<bool, Error>;

  /// Transition a non-terminal run to `cancelled`. Returns false when the
  /// run is absent or already terminal.
  async fn cancel_workflow_run(&self, run_id: &str, reason: &str) -> Result<bool, Error>;

  /// List runs for a scope, newest first.
  async fn list_workflow_runs(&self, scope: &str) -> Result<Vec<WorkflowRun>, Error>;

  /// Delete a run record. Returns false when absent.
  async fn delete_workflow_run(&self, run_id: &str) -> Result<bool, Error>;

  /// Create a new task run record.
  async fn create_task_run(&self, task: &TaskRun) -> Result<(), Error>;

  /// Get a task run by id.
  async fn get_task_run(&self, task_id: &str) -> Result<Option<TaskRun>, Error>;

  /// Persist the task's current state. Returns false when the stored record
  /// is absent or already terminal.
  async fn update_task_run(&self, task: &TaskRun) -> Result<bool, Error>;

  /// Transition a non-terminal task straight to a terminal status. Returns
  /// false when the task is absent or already terminal.
  async fn mark_task_terminal(
    &self,
    task_id: &str,
    status: TaskStatus,
    error: Option<&str>,
    error_detail: Option<&str>,
    finished_at: DateTime<Utc>,
    duration_ms: Option<i64>,
  ) -> Result<bool, Error>;

  /// List tasks for a scope, newest first, optionally filtered.
  async fn list_task_runs(&self, scope: &str, filter: &TaskFilter) -> Result<Vec<TaskRun>, Error>;

  /// Delete a task record. Returns false when absent.
  async fn delete_task_run(&self, task_id: &str) -> Result<bool, Error>;

  /// Fail every `running`/`pending` record with the restart marker. Run on
  /// process start; `paused` runs are left untouched. Returns the number of
  /// records rewritten.
  async fn recover_stale_on_startup(&self) -> Result<u64, Error>;

  /// Fail `running`/`pending` records older than `max_age_days` with the
  /// age marker. A periodic backstop independent of the startup sweep.
  async fn recover_stale_by_age(&self, max_age_days: u32) -> Result<u64, Error>;

  /// Delete terminal records older than `retention_days`. Never touches
  /// `paused`, `running`, or `pending` records regardless of age.
  async fn prune_older_than(&self, retention_days: u32) -> Result<u64, Error>;
}
