//! Retry wrapping around executor invocations.

use std::time::Duration;

use prizm_executor::{ExecutorError, ExecutorInput, ExecutorResult, ExecutorStatus, StepExecutor};
use prizm_workflow::{RetryConfig, RetryOn};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Classify an executor outcome for retry matching. `None` means the
/// outcome is not a failure (success, or cancellation - never retried).
pub(crate) fn failure_category(
  outcome: &Result<ExecutorResult, ExecutorError>,
) -> Option<RetryOn> {
  match outcome {
    Ok(result) => match result.status {
      ExecutorStatus::Success | ExecutorStatus::Cancelled => None,
      ExecutorStatus::Timeout => Some(RetryOn::Timeout),
      ExecutorStatus::Failed => Some(category_of(result.error.as_deref().unwrap_or_default())),
    },
    Err(err) => Some(category_of(&err.message)),
  }
}

// Heuristic: an error mentioning "timeout" belongs to the timeout category,
// anything else is a plain failure.
fn category_of(message: &str) -> RetryOn {
  if message.to_lowercase().contains("timeout") {
    RetryOn::Timeout
  } else {
    RetryOn::Failed
  }
}

/// Invoke the executor up to `1 + max_retries` times.
///
/// An outcome is retried only when its category appears in `retry_on`.
/// A fixed `retry_delay_ms` separates attempts; there is no backoff growth.
/// Cancellation stops the loop early with a `cancelled` result.
pub(crate) async fn execute_with_retry(
  executor: &dyn StepExecutor,
  scope: &str,
  input: &ExecutorInput,
  retry: Option<&RetryConfig>,
  cancel: &CancellationToken,
) -> Result<ExecutorResult, ExecutorError> {
  let default = RetryConfig::default();
  let retry = retry.unwrap_or(&default);
  let max_attempts = 1 + retry.max_retries;

  let mut attempt = 1;
  loop {
    if cancel.is_cancelled() {
      return Ok(ExecutorResult::cancelled());
    }

    let outcome = executor.execute(scope, input.clone(), cancel.clone()).await;
    let Some(category) = failure_category(&outcome) else {
      return outcome;
    };
    if attempt >= max_attempts || !retry.retry_on.contains(&category) {
      return outcome;
    }

    warn!(
      label = %input.label,
      attempt,
      max_attempts,
      category = ?category,
      "step attempt failed, retrying"
    );
    tokio::select! {
      _ = cancel.cancelled() => return Ok(ExecutorResult::cancelled()),
      _ = tokio::time::sleep(Duration::from_millis(retry.retry_delay_ms)) => {}
    }
    attempt += 1;
  }
}
