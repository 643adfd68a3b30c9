use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Paused,
  Completed,
  Failed,
  Cancelled,
}

impl RunStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
    )
  }
}

/// Status of a single step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Running,
  Completed,
  Failed,
  Skipped,
  Paused,
}

/// Status of a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Cancelled,
  Timeout,
}

impl TaskStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Timeout
    )
  }
}

/// What fired the run/task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TriggerType {
  #[default]
  Manual,
  Cron,
  Hook,
}

/// Result of one processed step. Stored inside the run's `step_results`
/// JSON column, keyed by step id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
  pub step_id: String,
  /// Step kind (`agent`, `approve`, `transform`).
  #[serde(rename = "type")]
  pub step_type: String,
  pub status: StepStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub structured_data: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub artifacts: Option<serde_json::Value>,
  /// Handle into the executor's own session record, opaque here.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  /// Only set for approve steps.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub approved: Option<bool>,
  pub started_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub finished_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_detail: Option<String>,
}

impl StepResult {
  /// A step that has just begun executing.
  pub fn started(step_id: impl Into<String>, step_type: impl Into<String>) -> Self {
    Self {
      step_id: step_id.into(),
      step_type: step_type.into(),
      status: StepStatus::Running,
      output: None,
      structured_data: None,
      artifacts: None,
      session_id: None,
      approved: None,
      started_at: Utc::now(),
      finished_at: None,
      duration_ms: None,
      error: None,
      error_detail: None,
    }
  }

  /// A step skipped by its condition; zero duration.
  pub fn skipped(step_id: impl Into<String>, step_type: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      status: StepStatus::Skipped,
      finished_at: Some(now),
      duration_ms: Some(0),
      ..Self::started(step_id, step_type)
    }
  }
}

/// A workflow run as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowRun {
  pub run_id: String,
  pub workflow_name: String,
  pub scope: String,
  pub status: RunStatus,
  pub trigger_type: TriggerType,
  pub current_step_index: i64,
  /// Results of every step processed so far, keyed by step id. Keys are
  /// exactly the processed steps - never steps not yet reached.
  pub step_results: Json<HashMap<String, StepResult>>,
  /// Present only while the run is paused at an approve step.
  pub resume_token: Option<String>,
  pub args: Json<HashMap<String, String>>,
  pub error: Option<String>,
  pub error_detail: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
  /// A freshly created, not-yet-started run.
  pub fn new(
    run_id: impl Into<String>,
    workflow_name: impl Into<String>,
    scope: impl Into<String>,
    trigger_type: TriggerType,
    args: HashMap<String, String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      run_id: run_id.into(),
      workflow_name: workflow_name.into(),
      scope: scope.into(),
      status: RunStatus::Pending,
      trigger_type,
      current_step_index: 0,
      step_results: Json(HashMap::new()),
      resume_token: None,
      args: Json(args),
      error: None,
      error_detail: None,
      created_at: now,
      updated_at: now,
    }
  }
}

/// A task run as stored in the database - structurally a run collapsed to
/// one implicit step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TaskRun {
  pub task_id: String,
  pub scope: String,
  pub label: Option<String>,
  pub status: TaskStatus,
  pub session_id: Option<String>,
  pub input: String,
  pub output: Option<String>,
  pub structured_data: Option<Json<serde_json::Value>>,
  pub artifacts: Option<Json<serde_json::Value>>,
  pub error: Option<String>,
  pub error_detail: Option<String>,
  pub trigger_type: TriggerType,
  pub parent_session_id: Option<String>,
  pub created_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  pub duration_ms: Option<i64>,
}

impl TaskRun {
  /// A freshly triggered task. Tasks have no queued state: they are
  /// `running` from creation.
  pub fn new(
    task_id: impl Into<String>,
    scope: impl Into<String>,
    input: impl Into<String>,
    trigger_type: TriggerType,
  ) -> Self {
    Self {
      task_id: task_id.into(),
      scope: scope.into(),
      label: None,
      status: TaskStatus::Running,
      session_id: None,
      input: input.into(),
      output: None,
      structured_data: None,
      artifacts: None,
      error: None,
      error_detail: None,
      trigger_type,
      parent_session_id: None,
      created_at: Utc::now(),
      finished_at: None,
      duration_ms: None,
    }
  }
}

/// Filter for task listings.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
  pub status: Option<TaskStatus>,
  pub parent_session_id: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_terminal_statuses() {
    assert!(RunStatus::Completed.is_terminal());
    assert!(RunStatus::Failed.is_terminal());
    assert!(RunStatus::Cancelled.is_terminal());
    assert!(!RunStatus::Paused.is_terminal());
    assert!(!RunStatus::Running.is_terminal());
    assert!(!RunStatus::Pending.is_terminal());

    assert!(TaskStatus::Timeout.is_terminal());
    assert!(!TaskStatus::Running.is_terminal());
  }

  #[test]
  fn test_step_result_serializes_type_field() {
    let result = StepResult::started("collect", "agent");
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["type"], "agent");
    assert_eq!(json["status"], "running");
  }

  #[test]
  fn test_skipped_has_zero_duration() {
    let result = StepResult::skipped("gate", "agent");
    assert_eq!(result.duration_ms, Some(0));
    assert!(result.finished_at.is_some());
  }
}
