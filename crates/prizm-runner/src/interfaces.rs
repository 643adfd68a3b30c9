//! External collaborator interfaces.
//!
//! The runners consume these as `Arc<dyn _>`; the surrounding service
//! provides implementations. Dispatcher and log sink failures are absorbed
//! by the runners and never affect a run's outcome.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prizm_store::{RunStatus, StepResult, TriggerType, WorkflowRun};
use prizm_workflow::WorkflowDef;
use serde::{Deserialize, Serialize};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Loads workflow definitions by name. Used on `resume` to reconstruct the
/// pipeline when the in-memory definition is gone (e.g. after a restart).
#[async_trait]
pub trait DefinitionStore: Send + Sync {
  async fn get_by_name(&self, name: &str, scope: &str) -> Result<Option<WorkflowDef>, BoxError>;
}

/// Dispatches a step's linked actions after it completes successfully.
///
/// Best-effort from the runner's point of view: a dispatch failure is
/// logged, never propagated to the step that triggered it.
#[async_trait]
pub trait LinkedActionDispatcher: Send + Sync {
  async fn dispatch(
    &self,
    scope: &str,
    actions: &[serde_json::Value],
    step_results: &HashMap<String, StepResult>,
    args: &HashMap<String, String>,
  ) -> Result<(), BoxError>;
}

/// Receives a full run-state snapshot after every transition, so external
/// tooling can show live progress without touching the primary store.
/// Delivery is best-effort.
#[async_trait]
pub trait RunLogSink: Send + Sync {
  async fn record(&self, snapshot: &RunSnapshot) -> Result<(), BoxError>;
}

/// Full state of a run at one transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
  pub run_id: String,
  pub workflow_name: String,
  pub scope: String,
  pub status: RunStatus,
  pub trigger_type: TriggerType,
  pub args: HashMap<String, String>,
  pub started_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub finished_at: Option<DateTime<Utc>>,
  pub step_results: HashMap<String, StepResult>,
}

impl From<&WorkflowRun> for RunSnapshot {
  fn from(run: &WorkflowRun) -> Self {
    Self {
      run_id: run.run_id.clone(),
      workflow_name: run.workflow_name.clone(),
      scope: run.scope.clone(),
      status: run.status,
      trigger_type: run.trigger_type,
      args: run.args.0.clone(),
      started_at: run.created_at,
      finished_at: run.status.is_terminal().then_some(run.updated_at),
      step_results: run.step_results.0.clone(),
    }
  }
}
