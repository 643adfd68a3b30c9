//! The task runner: one-off jobs with liveness supervision.
//!
//! A task is a workflow collapsed to one implicit step, for ad-hoc "run
//! this one unit of work" calls. Tasks are `running` from creation (no
//! queued state), carry a cancellation token and a deadline, and are
//! supervised by a background watchdog: the executor is an opaque external
//! call whose future may never resolve even after its token is cancelled,
//! and the watchdog is the only backstop against leaking those forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use prizm_executor::{ExecutorError, ExecutorInput, ExecutorResult, ExecutorStatus, StepExecutor};
use prizm_store::{RunStore, TaskFilter, TaskRun, TaskStatus, TriggerType};
use prizm_store::Json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::RunnerError;
use crate::events::{EventNotifier, RunEvent};
use crate::runner::CANCELLED_BY_USER;

/// Error recorded when the watchdog reclaims a task past its deadline.
pub const WATCHDOG_TIMEOUT_ERROR: &str =
  "Task exceeded its deadline and was reclaimed by the watchdog";

/// Tuning for the task runner.
#[derive(Debug, Clone)]
pub struct TaskRunnerConfig {
  /// Deadline applied when the caller specifies none.
  pub default_timeout_ms: u64,
  /// Interval between watchdog sweeps.
  pub watchdog_interval_ms: u64,
}

impl Default for TaskRunnerConfig {
  fn default() -> Self {
    Self {
      default_timeout_ms: 600_000,
      watchdog_interval_ms: 60_000,
    }
  }
}

/// Per-call metadata for `trigger`/`trigger_sync`.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
  pub label: Option<String>,
  pub timeout_ms: Option<u64>,
  pub trigger: TriggerType,
  pub parent_session_id: Option<String>,
  pub model: Option<String>,
}

struct PendingTask {
  cancel: CancellationToken,
  started: tokio::time::Instant,
  timeout_ms: u64,
}

/// Runs single ad-hoc jobs against the injected store and executor.
///
/// Cheap to clone; `new` spawns the watchdog, `shutdown()` stops it and
/// cancels every pending task.
#[derive(Clone)]
pub struct TaskRunner {
  store: Arc<dyn RunStore>,
  executor: Arc<dyn StepExecutor>,
  notifier: Arc<dyn EventNotifier>,
  config: TaskRunnerConfig,
  pending: Arc<Mutex<HashMap<String, PendingTask>>>,
  shutdown: CancellationToken,
}

impl TaskRunner {
  pub fn new(
    store: Arc<dyn RunStore>,
    executor: Arc<dyn StepExecutor>,
    notifier: Arc<dyn EventNotifier>,
    config: TaskRunnerConfig,
  ) -> Self {
    let runner = Self {
      store,
      executor,
      notifier,
      config,
      pending: Arc::new(Mutex::new(HashMap::new())),
      shutdown: CancellationToken::new(),
    };
    runner.spawn_watchdog();
    runner
  }

  /// Fire-and-forget: create the task record, start execution in the
  /// background, return the task id immediately.
  pub async fn trigger(
    &self,
    scope: &str,
    input: &str,
    options: TaskOptions,
  ) -> Result<String, RunnerError> {
    let (task_id, cancel) = self.create(scope, input, &options).await?;

    let runner = self.clone();
    let scope = scope.to_string();
    let input = input.to_string();
    let spawned_id = task_id.clone();
    tokio::spawn(async move {
      runner.execute(&spawned_id, &scope, &input, options, cancel).await;
    });

    Ok(task_id)
  }

  /// Same creation path as [`trigger`](Self::trigger), but awaits
  /// completion and returns the final record.
  pub async fn trigger_sync(
    &self,
    scope: &str,
    input: &str,
    options: TaskOptions,
  ) -> Result<TaskRun, RunnerError> {
    let (task_id, cancel) = self.create(scope, input, &options).await?;
    self.execute(&task_id, scope, input, options, cancel).await;
    self
      .store
      .get_task_run(&task_id)
      .await?
      .ok_or(RunnerError::TaskNotFound { task_id })
  }

  /// Cancel a task. Returns false when the task is absent or already
  /// terminal.
  pub async fn cancel(&self, task_id: &str) -> Result<bool, RunnerError> {
    let duration_ms = self
      .pending
      .lock()
      .await
      .get(task_id)
      .map(|p| p.started.elapsed().as_millis() as i64);

    // The compare-and-set in the store decides the race against a
    // concurrent completion write; only the winner fires the token.
    let cancelled = self
      .store
      .mark_task_terminal(
        task_id,
        TaskStatus::Cancelled,
        Some(CANCELLED_BY_USER),
        None,
        Utc::now(),
        duration_ms,
      )
      .await?;
    if !cancelled {
      return Ok(false);
    }

    if let Some(pending) = self.pending.lock().await.remove(task_id) {
      pending.cancel.cancel();
    }
    info!(task_id = %task_id, "task cancelled");
    self.notifier.notify(RunEvent::TaskCancelled {
      task_id: task_id.to_string(),
    });
    Ok(true)
  }

  pub async fn get_status(&self, task_id: &str) -> Result<Option<TaskRun>, RunnerError> {
    Ok(self.store.get_task_run(task_id).await?)
  }

  pub async fn list(&self, scope: &str, filter: &TaskFilter) -> Result<Vec<TaskRun>, RunnerError> {
    Ok(self.store.list_task_runs(scope, filter).await?)
  }

  /// Stop the watchdog and cancel every pending task. Their records
  /// converge to `cancelled` as the futures observe the signal.
  pub fn shutdown(&self) {
    self.shutdown.cancel();
  }

  async fn create(
    &self,
    scope: &str,
    input: &str,
    options: &TaskOptions,
  ) -> Result<(String, CancellationToken), RunnerError> {
    let task_id = Uuid::new_v4().to_string();
    let mut task = TaskRun::new(&task_id, scope, input, options.trigger);
    task.label = options.label.clone();
    task.parent_session_id = options.parent_session_id.clone();
    self.store.create_task_run(&task).await?;

    let cancel = self.shutdown.child_token();
    let timeout_ms = options.timeout_ms.unwrap_or(self.config.default_timeout_ms);
    self.pending.lock().await.insert(
      task_id.clone(),
      PendingTask {
        cancel: cancel.clone(),
        started: tokio::time::Instant::now(),
        timeout_ms,
      },
    );

    info!(task_id = %task_id, scope = %scope, "task started");
    self.notifier.notify(RunEvent::TaskStarted {
      task_id: task_id.clone(),
      scope: scope.to_string(),
    });
    Ok((task_id, cancel))
  }

  #[instrument(skip_all, fields(task_id = %task_id))]
  async fn execute(
    &self,
    task_id: &str,
    scope: &str,
    input: &str,
    options: TaskOptions,
    cancel: CancellationToken,
  ) {
    let timeout_ms = options.timeout_ms.unwrap_or(self.config.default_timeout_ms);
    let exec_input = ExecutorInput {
      prompt: input.to_string(),
      model: options.model.clone(),
      timeout_ms: Some(timeout_ms),
      label: options.label.clone().unwrap_or_else(|| task_id.to_string()),
      ..Default::default()
    };
    let started = tokio::time::Instant::now();

    tokio::select! {
      _ = cancel.cancelled() => {
        // Explicit cancel and the watchdog write their own terminal marker
        // before firing the token; this write only lands on shutdown. The
        // record must not stay `running` once the signal has fired.
        self.mark_terminal(task_id, TaskStatus::Cancelled, Some(CANCELLED_BY_USER), None, Some(started.elapsed().as_millis() as i64)).await;
      }
      outcome = self.executor.execute(scope, exec_input, cancel.clone()) => {
        self.record_outcome(task_id, outcome, started.elapsed().as_millis() as i64).await;
      }
    }

    self.pending.lock().await.remove(task_id);
  }

  async fn record_outcome(
    &self,
    task_id: &str,
    outcome: Result<ExecutorResult, ExecutorError>,
    elapsed_ms: i64,
  ) {
    let result = match outcome {
      Ok(result) => result,
      Err(err) => {
        error!(task_id = %task_id, error = %err.message, "task executor blew up");
        self
          .mark_terminal(
            task_id,
            TaskStatus::Failed,
            Some(&err.message),
            err.detail.as_deref(),
            Some(elapsed_ms),
          )
          .await;
        self.notifier.notify(RunEvent::TaskFailed {
          task_id: task_id.to_string(),
          error: err.message,
        });
        return;
      }
    };

    let duration_ms = result.duration_ms.unwrap_or(elapsed_ms);
    match result.status {
      ExecutorStatus::Success => {
        match self.store.get_task_run(task_id).await {
          Ok(Some(mut task)) => {
            task.status = TaskStatus::Completed;
            task.session_id = result.session_id;
            task.output = result.output;
            task.structured_data = result.structured_data.map(Json);
            task.artifacts = result.artifacts.map(Json);
            task.finished_at = Some(Utc::now());
            task.duration_ms = Some(duration_ms);
            match self.store.update_task_run(&task).await {
              Ok(true) => {
                info!(task_id = %task_id, duration_ms, "task completed");
                self.notifier.notify(RunEvent::TaskCompleted {
                  task_id: task_id.to_string(),
                });
              }
              // Lost the race against cancel or the watchdog; their
              // terminal status stands.
              Ok(false) => {}
              Err(e) => error!(task_id = %task_id, error = %e, "task completion write failed"),
            }
          }
          Ok(None) => warn!(task_id = %task_id, "task record vanished before completion"),
          Err(e) => error!(task_id = %task_id, error = %e, "task record fetch failed"),
        }
      }
      ExecutorStatus::Failed => {
        let message = result.error.unwrap_or_else(|| "task failed".to_string());
        self
          .mark_terminal(task_id, TaskStatus::Failed, Some(&message), None, Some(duration_ms))
          .await;
        self.notifier.notify(RunEvent::TaskFailed {
          task_id: task_id.to_string(),
          error: message,
        });
      }
      ExecutorStatus::Timeout => {
        let message = result
          .error
          .unwrap_or_else(|| "task timed out".to_string());
        self
          .mark_terminal(task_id, TaskStatus::Timeout, Some(&message), None, Some(duration_ms))
          .await;
        self.notifier.notify(RunEvent::TaskFailed {
          task_id: task_id.to_string(),
          error: message,
        });
      }
      ExecutorStatus::Cancelled => {
        self
          .mark_terminal(
            task_id,
            TaskStatus::Cancelled,
            Some(CANCELLED_BY_USER),
            None,
            Some(duration_ms),
          )
          .await;
      }
    }
  }

  async fn mark_terminal(
    &self,
    task_id: &str,
    status: TaskStatus,
    error: Option<&str>,
    detail: Option<&str>,
    duration_ms: Option<i64>,
  ) {
    match self
      .store
      .mark_task_terminal(task_id, status, error, detail, Utc::now(), duration_ms)
      .await
    {
      Ok(_) => {}
      Err(e) => error!(task_id = %task_id, error = %e, "task terminal write failed"),
    }
  }

  fn spawn_watchdog(&self) {
    let runner = self.clone();
    tokio::spawn(async move {
      let interval = Duration::from_millis(runner.config.watchdog_interval_ms);
      loop {
        tokio::select! {
          _ = runner.shutdown.cancelled() => break,
          _ = tokio::time::sleep(interval) => {}
        }
        runner.sweep_expired().await;
      }
    });
  }

  /// Reclaim tasks whose elapsed wall time exceeds 1.5x their deadline.
  async fn sweep_expired(&self) {
    let expired: Vec<(String, CancellationToken, i64)> = {
      let mut pending = self.pending.lock().await;
      let expired_ids: Vec<String> = pending
        .iter()
        .filter(|(_, p)| {
          p.started.elapsed().as_millis() as u64 > p.timeout_ms.saturating_mul(3) / 2
        })
        .map(|(id, _)| id.clone())
        .collect();
      expired_ids
        .into_iter()
        .filter_map(|id| {
          pending
            .remove(&id)
            .map(|p| (id, p.cancel, p.started.elapsed().as_millis() as i64))
        })
        .collect()
    };

    for (task_id, cancel, elapsed_ms) in expired {
      warn!(task_id = %task_id, elapsed_ms, "watchdog reclaiming task past its deadline");
      match self
        .store
        .mark_task_terminal(
          &task_id,
          TaskStatus::Timeout,
          Some(WATCHDOG_TIMEOUT_ERROR),
          None,
          Utc::now(),
          Some(elapsed_ms),
        )
        .await
      {
        Ok(true) => {
          self.notifier.notify(RunEvent::TaskFailed {
            task_id: task_id.clone(),
            error: WATCHDOG_TIMEOUT_ERROR.to_string(),
          });
        }
        Ok(false) => {}
        Err(e) => error!(task_id = %task_id, error = %e, "watchdog terminal write failed"),
      }
      cancel.cancel();
    }
  }
}
