use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::enums::{ErrorStrategy, WorkspaceMode};
use crate::step::StepDef;

/// A named, ordered pipeline of steps. Immutable per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub name: String,
  pub steps: Vec<StepDef>,
  /// Declared run arguments, referenced in steps as `$args.name`.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub args: HashMap<String, ArgDef>,
  /// Declared outputs; advisory metadata for the surrounding service.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub outputs: HashMap<String, OutputDef>,
  #[serde(default)]
  pub config: WorkflowConfig,
}

impl WorkflowDef {
  /// Step ids in definition order.
  pub fn step_ids(&self) -> Vec<String> {
    self.steps.iter().map(|s| s.id.clone()).collect()
  }
}

/// Declared run argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgDef {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default: Option<String>,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub arg_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

/// Declared workflow output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub output_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

/// Run-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
  #[serde(default)]
  pub error_strategy: ErrorStrategy,
  #[serde(default)]
  pub workspace_mode: WorkspaceMode,
  /// Deadline for the whole run; exhaustion is fatal regardless of
  /// `error_strategy`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_total_timeout_ms: Option<u64>,
  /// Step outputs beyond this length are truncated with a marker.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_step_output_chars: Option<usize>,
  #[serde(default = "default_true")]
  pub notify_on_complete: bool,
  #[serde(default = "default_true")]
  pub notify_on_fail: bool,
  /// Wipe the workflow workspace (except the reserved metadata subtree)
  /// before the run starts.
  #[serde(default)]
  pub clean_before: bool,
}

fn default_true() -> bool {
  true
}

impl Default for WorkflowConfig {
  fn default() -> Self {
    Self {
      error_strategy: ErrorStrategy::default(),
      workspace_mode: WorkspaceMode::default(),
      max_total_timeout_ms: None,
      max_step_output_chars: None,
      notify_on_complete: true,
      notify_on_fail: true,
      clean_before: false,
    }
  }
}
