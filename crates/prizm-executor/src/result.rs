//! Executor result types.

use serde::{Deserialize, Serialize};

/// Outcome category reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorStatus {
  Success,
  Failed,
  Timeout,
  Cancelled,
}

/// Result of one executor invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorResult {
  /// Handle into the executor's own session record; opaque to the core.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  pub status: ExecutorStatus,
  /// Textual output of the unit of work.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
  /// Structured output, when the executor extracted any.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub structured_data: Option<serde_json::Value>,
  /// Artifacts produced (paths, attachment handles); opaque to the core.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub artifacts: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<i64>,
  /// One-line failure summary when status is not `Success`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ExecutorResult {
  /// A plain successful result with textual output.
  pub fn success(output: impl Into<String>) -> Self {
    Self {
      session_id: None,
      status: ExecutorStatus::Success,
      output: Some(output.into()),
      structured_data: None,
      artifacts: None,
      duration_ms: None,
      error: None,
    }
  }

  /// A failed result with an error summary.
  pub fn failed(error: impl Into<String>) -> Self {
    Self {
      session_id: None,
      status: ExecutorStatus::Failed,
      output: None,
      structured_data: None,
      artifacts: None,
      duration_ms: None,
      error: Some(error.into()),
    }
  }

  /// A cancelled result.
  pub fn cancelled() -> Self {
    Self {
      session_id: None,
      status: ExecutorStatus::Cancelled,
      output: None,
      structured_data: None,
      artifacts: None,
      duration_ms: None,
      error: Some("cancelled".to_string()),
    }
  }
}
