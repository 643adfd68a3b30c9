//! Run events and notifiers for observability.
//!
//! Events are advisory broadcasts emitted at run/task transitions. Nothing
//! blocks waiting for a subscriber; a slow or absent consumer never affects
//! a run's outcome.

use prizm_store::StepStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during workflow and task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RunEvent {
  #[serde(rename = "workflow.started")]
  WorkflowStarted {
    run_id: String,
    workflow_name: String,
    scope: String,
  },

  /// A step finished (completed, failed, or skipped). `output_preview` is
  /// truncated; the full output lives in the run record.
  #[serde(rename = "workflow.step.completed")]
  StepCompleted {
    run_id: String,
    step_id: String,
    status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_preview: Option<String>,
  },

  /// The run paused at an approve step and is waiting out-of-band.
  #[serde(rename = "workflow.paused")]
  WorkflowPaused {
    run_id: String,
    approve_prompt: String,
    resume_token: String,
  },

  #[serde(rename = "workflow.completed")]
  WorkflowCompleted { run_id: String },

  #[serde(rename = "workflow.failed")]
  WorkflowFailed { run_id: String, error: String },

  #[serde(rename = "task.started")]
  TaskStarted { task_id: String, scope: String },

  #[serde(rename = "task.completed")]
  TaskCompleted { task_id: String },

  #[serde(rename = "task.failed")]
  TaskFailed { task_id: String, error: String },

  #[serde(rename = "task.cancelled")]
  TaskCancelled { task_id: String },
}

/// Trait for receiving run events.
///
/// The runners call `notify` for each event - implementations decide what
/// to do with them (persist, broadcast, log, ignore, etc.).
pub trait EventNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {
    // Intentionally empty
  }
}

/// A notifier that sends events to an unbounded channel.
///
/// Use this when events need async consumption (persist to a database,
/// stream to a UI over SSE, etc.). The channel is unbounded so a slow
/// consumer cannot block the runner; event volume is low (a handful per
/// step), so memory growth is unlikely in practice.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl EventNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_event_serialization_tags() {
    let event = RunEvent::WorkflowPaused {
      run_id: "run-1".to_string(),
      approve_prompt: "Send it?".to_string(),
      resume_token: "tok".to_string(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "workflow.paused");
    assert_eq!(json["resume_token"], "tok");
  }

  #[test]
  fn test_channel_notifier_delivers() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);
    notifier.notify(RunEvent::TaskCompleted {
      task_id: "task-1".to_string(),
    });
    let received = rx.try_recv().unwrap();
    assert!(matches!(received, RunEvent::TaskCompleted { .. }));
  }
}
