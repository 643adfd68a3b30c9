//! Runner errors.
//!
//! Only bad input to `run`/`resume`/`cancel` and infrastructure failures
//! surface as `Err`. Executor failures and deadline exhaustion are captured
//! in the run/task record instead, because they are outcomes of a run, not
//! failures of the runner.

use prizm_store::RunStatus;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
  /// No run matches the supplied resume token.
  #[error("no run matches the supplied resume token")]
  InvalidToken,

  /// The run exists but is not in a state the operation accepts.
  #[error("run {run_id} is {status:?} and cannot be resumed")]
  InvalidState { run_id: String, status: RunStatus },

  /// The definition store has no workflow by this name.
  #[error("workflow definition not found: {name}")]
  DefinitionNotFound { name: String },

  /// The definition store itself failed.
  #[error("definition lookup failed: {message}")]
  DefinitionLookup { message: String },

  /// No task record with this id.
  #[error("task not found: {task_id}")]
  TaskNotFound { task_id: String },

  /// Workspace directory creation or cleanup failed.
  #[error("workspace error: {0}")]
  Workspace(#[from] std::io::Error),

  #[error(transparent)]
  Store(#[from] prizm_store::Error),
}
