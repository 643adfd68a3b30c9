//! The step executor trait and its input.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::result::ExecutorResult;

/// Input for one executor invocation. Everything the runner resolved on
/// behalf of the step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorInput {
  /// Fully resolved prompt text.
  pub prompt: String,
  /// Piped-in context from an earlier step, if any.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub system_instructions: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  /// Human-readable label for the executor's own bookkeeping.
  pub label: String,
  /// Working directory the executor should operate in.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub workspace_dir: Option<String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub input_params: HashMap<String, serde_json::Value>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub output_params: HashMap<String, serde_json::Value>,
}

/// The injected capability that performs a step's unit of work.
///
/// Implementations must observe `cancel` and return promptly with a
/// `cancelled` status when it fires. The runner passes a fresh token per
/// run/task and never force-kills an executor.
#[async_trait]
pub trait StepExecutor: Send + Sync {
  async fn execute(
    &self,
    scope: &str,
    input: ExecutorInput,
    cancel: CancellationToken,
  ) -> Result<ExecutorResult, ExecutorError>;
}
