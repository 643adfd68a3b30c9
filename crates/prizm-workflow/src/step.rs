use serde::{Deserialize, Serialize};

use crate::enums::RetryOn;

/// A single step within a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  /// Unique id within the definition. Step results are keyed by this id and
  /// other steps reference it as `$id.prop`.
  pub id: String,
  #[serde(flatten)]
  pub action: StepAction,
  /// Explicit input reference expression (e.g. `$collect.output`). When
  /// absent, the last completed step's output is piped in implicitly.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input: Option<String>,
  /// Boolean reference expression; when it evaluates false the step is
  /// skipped without invoking the executor.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retry_config: Option<RetryConfig>,
  /// Opaque side-effect descriptors handed to the linked-action dispatcher
  /// after this step completes successfully.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub linked_actions: Vec<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

/// What a step does. Closed set: new kinds are additive variants, each with
/// one handler in the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
  /// Invoke the external step executor with a resolved prompt.
  Agent {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
  },
  /// Pause the run and wait for an out-of-band approval.
  Approve { approve_prompt: String },
  /// Extract a value from the step input via a dot-path expression.
  /// No executor call is made.
  Transform { transform: String },
}

impl StepAction {
  /// Stable name of the step kind, as recorded in step results.
  pub fn kind(&self) -> &'static str {
    match self {
      StepAction::Agent { .. } => "agent",
      StepAction::Approve { .. } => "approve",
      StepAction::Transform { .. } => "transform",
    }
  }
}

/// Retry policy for a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
  /// Additional attempts after the first; a step runs at most
  /// `1 + max_retries` times.
  #[serde(default)]
  pub max_retries: u32,
  /// Fixed delay between attempts. No backoff growth.
  #[serde(default = "default_retry_delay_ms")]
  pub retry_delay_ms: u64,
  /// Which failure categories are retried.
  #[serde(default = "default_retry_on")]
  pub retry_on: Vec<RetryOn>,
}

fn default_retry_delay_ms() -> u64 {
  1_000
}

fn default_retry_on() -> Vec<RetryOn> {
  vec![RetryOn::Failed]
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 0,
      retry_delay_ms: default_retry_delay_ms(),
      retry_on: default_retry_on(),
    }
  }
}
