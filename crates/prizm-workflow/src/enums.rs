use serde::{Deserialize, Serialize};

/// How the run reacts to a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
  /// The first failed step fails the whole run (default).
  #[default]
  FailFast,
  /// Failed steps are recorded and execution proceeds to the next step.
  Continue,
}

/// How much filesystem state a workflow shares across its own runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceMode {
  /// Each run gets a cross-run persistent directory plus a per-run
  /// ephemeral directory (default).
  #[default]
  Dual,
  /// Every run reuses one workflow-level directory.
  Shared,
  /// Each run gets its own directory and nothing else.
  Isolated,
}

/// Failure categories a step retry may be configured to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
  Failed,
  Timeout,
}
