//! The workflow runner state machine.
//!
//! Drives a named sequence of steps through the run lifecycle: condition
//! checks, input piping, reference resolution, executor invocation with
//! retry, pause/resume at approve steps, cancellation, and per-run plus
//! total timeouts. Every transition is persisted before control moves on,
//! so the store is always a truthful reflection of the last completed
//! transition.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use prizm_executor::{ExecutorError, ExecutorInput, ExecutorResult, ExecutorStatus, StepExecutor};
use prizm_resolve::{RefContext, eval_condition, interpolate, last_completed_step};
use prizm_store::{RunStatus, RunStore, StepResult, StepStatus, TriggerType, WorkflowRun};
use prizm_workflow::{ErrorStrategy, StepAction, StepDef, WorkflowDef};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::RunnerError;
use crate::events::{EventNotifier, NoopNotifier, RunEvent};
use crate::interfaces::{DefinitionStore, LinkedActionDispatcher, RunLogSink, RunSnapshot};
use crate::retry::execute_with_retry;
use crate::workspace::{WorkspacePaths, clean_workspace, resolve_workspace};

/// Reason recorded on user-initiated cancellation.
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

/// Marker appended to outputs cut at `max_step_output_chars`.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

const PREVIEW_MAX_CHARS: usize = 200;

/// Options for one `run`/`start` call.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  pub args: HashMap<String, String>,
  pub trigger: TriggerType,
  /// Run-level linked actions, dispatched once when the run completes.
  pub linked_actions: Vec<serde_json::Value>,
  /// Wipe the workflow workspace before starting, in addition to the
  /// definition's own `clean_before`.
  pub clean_before: bool,
}

/// What a `run`/`resume` call hands back once the run reaches a terminal
/// state or a pause point.
#[derive(Debug, Clone)]
pub struct RunResult {
  pub run_id: String,
  pub status: RunStatus,
  pub resume_token: Option<String>,
  pub approve_prompt: Option<String>,
  pub final_output: Option<String>,
  pub final_structured_output: Option<serde_json::Value>,
  pub error: Option<String>,
}

/// Executes workflow definitions against the injected store and executor.
///
/// One instance per process; cheap to clone (all state is shared).
/// `shutdown()` cancels every in-flight run.
#[derive(Clone)]
pub struct WorkflowRunner {
  store: Arc<dyn RunStore>,
  executor: Arc<dyn StepExecutor>,
  definitions: Arc<dyn DefinitionStore>,
  notifier: Arc<dyn EventNotifier>,
  dispatcher: Option<Arc<dyn LinkedActionDispatcher>>,
  log_sink: Option<Arc<dyn RunLogSink>>,
  workspace_root: PathBuf,
  active: Arc<Mutex<HashMap<String, CancellationToken>>>,
  shutdown: CancellationToken,
}

impl WorkflowRunner {
  pub fn new(
    store: Arc<dyn RunStore>,
    executor: Arc<dyn StepExecutor>,
    definitions: Arc<dyn DefinitionStore>,
    workspace_root: impl Into<PathBuf>,
  ) -> Self {
    Self {
      store,
      executor,
      definitions,
      notifier: Arc::new(NoopNotifier),
      dispatcher: None,
      log_sink: None,
      workspace_root: workspace_root.into(),
      active: Arc::new(Mutex::new(HashMap::new())),
      shutdown: CancellationToken::new(),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn with_dispatcher(mut self, dispatcher: Arc<dyn LinkedActionDispatcher>) -> Self {
    self.dispatcher = Some(dispatcher);
    self
  }

  pub fn with_log_sink(mut self, log_sink: Arc<dyn RunLogSink>) -> Self {
    self.log_sink = Some(log_sink);
    self
  }

  /// Execute a workflow and wait for it to reach a terminal state or a
  /// pause point.
  pub async fn run(
    &self,
    scope: &str,
    def: &WorkflowDef,
    options: RunOptions,
  ) -> Result<RunResult, RunnerError> {
    let (run, workspace, cancel) = self.prepare(scope, def, &options).await?;
    self
      .drive(def, run, 0, workspace, options.linked_actions, cancel)
      .await
  }

  /// Create the run and return its id immediately; execution proceeds in
  /// the background. Callers poll [`get_run`](Self::get_run) for progress.
  pub async fn start(
    &self,
    scope: &str,
    def: &WorkflowDef,
    options: RunOptions,
  ) -> Result<String, RunnerError> {
    let (run, workspace, cancel) = self.prepare(scope, def, &options).await?;
    let run_id = run.run_id.clone();

    let runner = self.clone();
    let def = def.clone();
    let linked = options.linked_actions;
    tokio::spawn(async move {
      if let Err(e) = runner.drive(&def, run, 0, workspace, linked, cancel).await {
        error!(error = %e, "background workflow run failed");
      }
    });

    Ok(run_id)
  }

  /// Resume a paused run, recording the approval outcome on the paused
  /// step and continuing from the next one.
  ///
  /// The approval value is advisory: `approved = false` does not halt the
  /// run by itself, later steps gate on it through their own `condition`.
  pub async fn resume(&self, token: &str, approved: bool) -> Result<RunResult, RunnerError> {
    let Some(mut run) = self.store.find_by_resume_token(token).await? else {
      return Err(RunnerError::InvalidToken);
    };
    if run.status != RunStatus::Paused {
      return Err(RunnerError::InvalidState {
        run_id: run.run_id,
        status: run.status,
      });
    }

    let def = self
      .definitions
      .get_by_name(&run.workflow_name, &run.scope)
      .await
      .map_err(|e| RunnerError::DefinitionLookup {
        message: e.to_string(),
      })?
      .ok_or_else(|| RunnerError::DefinitionNotFound {
        name: run.workflow_name.clone(),
      })?;

    let index = run.current_step_index as usize;
    let Some(step) = def.steps.get(index) else {
      return Err(RunnerError::InvalidState {
        run_id: run.run_id,
        status: run.status,
      });
    };

    info!(run_id = %run.run_id, step_id = %step.id, approved, "resuming workflow run");

    let now = Utc::now();
    if let Some(result) = run.step_results.0.get_mut(&step.id) {
      result.status = StepStatus::Completed;
      result.approved = Some(approved);
      result.finished_at = Some(now);
      result.duration_ms = Some((now - result.started_at).num_milliseconds());
    }
    run.status = RunStatus::Running;
    run.resume_token = None;
    run.updated_at = now;
    // The guarded token consumption in the store decides the race between
    // concurrent resume calls (and a concurrent cancel): exactly one claim
    // lands, every other caller sees a dead token.
    if !self.store.claim_paused_run(&run, token).await? {
      return Err(RunnerError::InvalidToken);
    }
    self.snapshot(&run).await;

    let workspace = resolve_workspace(
      &self.workspace_root,
      &def.name,
      &run.run_id,
      def.config.workspace_mode,
    )
    .await?;
    let cancel = self.register(&run.run_id).await;

    self
      .drive(&def, run, index + 1, workspace, Vec::new(), cancel)
      .await
  }

  /// Cancel a run. Returns false when the run is absent or already
  /// terminal; otherwise marks it cancelled and fires the in-flight
  /// executor's cancellation signal.
  pub async fn cancel(&self, run_id: &str) -> Result<bool, RunnerError> {
    // Mark the store first: the compare-and-set there is what decides the
    // race against a concurrent step-completion write. The in-flight
    // future then observes the token and unwinds.
    if !self.store.cancel_workflow_run(run_id, CANCELLED_BY_USER).await? {
      return Ok(false);
    }
    if let Some(token) = self.active.lock().await.remove(run_id) {
      token.cancel();
    }

    info!(run_id = %run_id, "workflow run cancelled");
    self.notifier.notify(RunEvent::WorkflowFailed {
      run_id: run_id.to_string(),
      error: CANCELLED_BY_USER.to_string(),
    });
    if let Some(run) = self.store.get_workflow_run(run_id).await? {
      self.snapshot(&run).await;
    }
    Ok(true)
  }

  pub async fn get_run(&self, run_id: &str) -> Result<Option<WorkflowRun>, RunnerError> {
    Ok(self.store.get_workflow_run(run_id).await?)
  }

  pub async fn list_runs(&self, scope: &str) -> Result<Vec<WorkflowRun>, RunnerError> {
    Ok(self.store.list_workflow_runs(scope).await?)
  }

  /// Cancel every in-flight run. Individual records converge to
  /// `cancelled` as their futures observe the signal.
  pub fn shutdown(&self) {
    self.shutdown.cancel();
  }

  async fn prepare(
    &self,
    scope: &str,
    def: &WorkflowDef,
    options: &RunOptions,
  ) -> Result<(WorkflowRun, WorkspacePaths, CancellationToken), RunnerError> {
    let run_id = Uuid::new_v4().to_string();
    let args = merged_args(def, options.args.clone());

    let mut run = WorkflowRun::new(&run_id, &def.name, scope, options.trigger, args);
    self.store.create_workflow_run(&run).await?;

    run.status = RunStatus::Running;
    self.persist(&mut run).await?;

    info!(run_id = %run_id, workflow = %def.name, scope = %scope, "workflow run started");
    self.notifier.notify(RunEvent::WorkflowStarted {
      run_id: run_id.clone(),
      workflow_name: def.name.clone(),
      scope: scope.to_string(),
    });
    self.snapshot(&run).await;

    if options.clean_before || def.config.clean_before {
      clean_workspace(&self.workspace_root, &def.name).await?;
    }
    let workspace = resolve_workspace(
      &self.workspace_root,
      &def.name,
      &run_id,
      def.config.workspace_mode,
    )
    .await?;

    let cancel = self.register(&run_id).await;
    Ok((run, workspace, cancel))
  }

  async fn register(&self, run_id: &str) -> CancellationToken {
    let token = self.shutdown.child_token();
    self
      .active
      .lock()
      .await
      .insert(run_id.to_string(), token.clone());
    token
  }

  #[instrument(skip_all, fields(run_id = %run.run_id, workflow = %def.name))]
  async fn drive(
    &self,
    def: &WorkflowDef,
    mut run: WorkflowRun,
    start_index: usize,
    workspace: WorkspacePaths,
    run_linked: Vec<serde_json::Value>,
    cancel: CancellationToken,
  ) -> Result<RunResult, RunnerError> {
    let result = self
      .drive_steps(def, &mut run, start_index, &workspace, run_linked, &cancel)
      .await;
    self.active.lock().await.remove(&run.run_id);
    result
  }

  async fn drive_steps(
    &self,
    def: &WorkflowDef,
    run: &mut WorkflowRun,
    start_index: usize,
    workspace: &WorkspacePaths,
    run_linked: Vec<serde_json::Value>,
    cancel: &CancellationToken,
  ) -> Result<RunResult, RunnerError> {
    let ordered_ids = def.step_ids();
    let deadline = def
      .config
      .max_total_timeout_ms
      .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

    for index in start_index..def.steps.len() {
      if cancel.is_cancelled() {
        return self.finalize_cancelled(run).await;
      }
      if let Some(deadline) = deadline {
        if tokio::time::Instant::now() >= deadline {
          let message = format!(
            "Workflow exceeded its total timeout of {} ms",
            def.config.max_total_timeout_ms.unwrap_or_default()
          );
          return self.finalize_failed(def, run, message, None).await;
        }
      }

      let step = &def.steps[index];
      run.current_step_index = index as i64;
      let ctx = ref_context(run, &ordered_ids, index);

      if let Some(condition) = &step.condition {
        if !eval_condition(condition, &ctx) {
          info!(step_id = %step.id, condition = %condition, "step skipped by condition");
          run
            .step_results
            .0
            .insert(step.id.clone(), StepResult::skipped(&step.id, step.action.kind()));
          if !self.persist(run).await? {
            return self.finalize_cancelled(run).await;
          }
          self.snapshot(run).await;
          self.notify_step(run, &step.id, StepStatus::Skipped, None);
          continue;
        }
      }

      run
        .step_results
        .0
        .insert(step.id.clone(), StepResult::started(&step.id, step.action.kind()));
      if !self.persist(run).await? {
        return self.finalize_cancelled(run).await;
      }
      self.snapshot(run).await;

      // Explicit input wins; otherwise the last completed step's output is
      // piped in implicitly for any step beyond the first.
      let context = match &step.input {
        Some(expr) => Some(interpolate(expr, &ctx)),
        None if index > 0 => {
          prizm_resolve::resolve_reference("prev", &["output"], &ctx).filter(|s| !s.is_empty())
        }
        None => None,
      };

      let outcome = match &step.action {
        StepAction::Approve { approve_prompt } => {
          return self
            .pause_at(run, step, interpolate(approve_prompt, &ctx))
            .await;
        }
        StepAction::Agent { prompt, model } => {
          let input = ExecutorInput {
            prompt: interpolate(prompt, &ctx),
            context: context.clone(),
            model: model.clone(),
            timeout_ms: step.timeout_ms,
            label: format!("{}/{}", def.name, step.id),
            workspace_dir: Some(workspace.primary.to_string_lossy().into_owned()),
            ..Default::default()
          };
          execute_with_retry(
            self.executor.as_ref(),
            &run.scope,
            &input,
            step.retry_config.as_ref(),
            cancel,
          )
          .await
        }
        StepAction::Transform { transform } => {
          Ok(ExecutorResult::success(apply_transform(
            context.as_deref(),
            transform,
            &ctx,
          )))
        }
      };

      match self
        .settle_step(def, run, step, outcome, cancel)
        .await?
      {
        StepVerdict::Continue => {}
        StepVerdict::Halt(result) => return Ok(result),
      }
    }

    self.finalize_completed(def, run, run_linked).await
  }

  /// Fold one executor outcome into the step's persisted result and decide
  /// whether the run continues.
  async fn settle_step(
    &self,
    def: &WorkflowDef,
    run: &mut WorkflowRun,
    step: &StepDef,
    outcome: Result<ExecutorResult, ExecutorError>,
    cancel: &CancellationToken,
  ) -> Result<StepVerdict, RunnerError> {
    let now = Utc::now();

    let (status, result, detail) = match outcome {
      Ok(result) => match result.status {
        ExecutorStatus::Success => (StepStatus::Completed, result, None),
        ExecutorStatus::Cancelled => {
          return Ok(StepVerdict::Halt(self.finalize_cancelled(run).await?));
        }
        ExecutorStatus::Failed | ExecutorStatus::Timeout => (StepStatus::Failed, result, None),
      },
      // The executor blew up instead of returning a result; equivalent to
      // a failure, with the diagnostic preserved in error_detail.
      Err(err) => {
        let detail = err.detail.clone();
        (StepStatus::Failed, ExecutorResult::failed(err.message), detail)
      }
    };

    let truncated = result
      .output
      .map(|o| truncate_chars(o, def.config.max_step_output_chars));

    if let Some(entry) = run.step_results.0.get_mut(&step.id) {
      entry.status = status;
      entry.output = truncated;
      entry.structured_data = result.structured_data;
      entry.artifacts = result.artifacts;
      entry.session_id = result.session_id;
      entry.finished_at = Some(now);
      entry.duration_ms = result
        .duration_ms
        .or(Some((now - entry.started_at).num_milliseconds()));
      entry.error = result.error.clone();
      entry.error_detail = detail;
    }

    if !self.persist(run).await? {
      return Ok(StepVerdict::Halt(self.finalize_cancelled(run).await?));
    }
    self.snapshot(run).await;
    let preview = run
      .step_results
      .0
      .get(&step.id)
      .and_then(|r| r.output.clone())
      .map(|o| truncate_chars(o, Some(PREVIEW_MAX_CHARS)));
    self.notify_step(run, &step.id, status, preview);

    match status {
      StepStatus::Completed => {
        self.dispatch_linked(run, &step.linked_actions, &step.id).await;
        Ok(StepVerdict::Continue)
      }
      _ if cancel.is_cancelled() => {
        Ok(StepVerdict::Halt(self.finalize_cancelled(run).await?))
      }
      _ => {
        let message = result
          .error
          .unwrap_or_else(|| format!("step {} failed", step.id));
        match def.config.error_strategy {
          ErrorStrategy::Continue => {
            warn!(step_id = %step.id, error = %message, "step failed, continuing per error strategy");
            Ok(StepVerdict::Continue)
          }
          ErrorStrategy::FailFast => {
            let detail = run
              .step_results
              .0
              .get(&step.id)
              .and_then(|r| r.error_detail.clone());
            Ok(StepVerdict::Halt(
              self.finalize_failed(def, run, message, detail).await?,
            ))
          }
        }
      }
    }
  }

  async fn pause_at(
    &self,
    run: &mut WorkflowRun,
    step: &StepDef,
    approve_prompt: String,
  ) -> Result<RunResult, RunnerError> {
    let token = Uuid::new_v4().to_string();
    run.status = RunStatus::Paused;
    run.resume_token = Some(token.clone());
    if let Some(entry) = run.step_results.0.get_mut(&step.id) {
      entry.status = StepStatus::Paused;
    }
    if !self.persist(run).await? {
      return self.finalize_cancelled(run).await;
    }

    info!(run_id = %run.run_id, step_id = %step.id, "workflow paused awaiting approval");
    self.notifier.notify(RunEvent::WorkflowPaused {
      run_id: run.run_id.clone(),
      approve_prompt: approve_prompt.clone(),
      resume_token: token.clone(),
    });
    self.snapshot(run).await;

    Ok(RunResult {
      run_id: run.run_id.clone(),
      status: RunStatus::Paused,
      resume_token: Some(token),
      approve_prompt: Some(approve_prompt),
      final_output: None,
      final_structured_output: None,
      error: None,
    })
  }

  async fn finalize_completed(
    &self,
    def: &WorkflowDef,
    run: &mut WorkflowRun,
    run_linked: Vec<serde_json::Value>,
  ) -> Result<RunResult, RunnerError> {
    let (final_output, final_structured) = final_outputs(def, run);

    run.status = RunStatus::Completed;
    if !self.persist(run).await? {
      return self.finalize_cancelled(run).await;
    }

    info!(run_id = %run.run_id, "workflow run completed");
    self.dispatch_linked(run, &run_linked, "run").await;
    if def.config.notify_on_complete {
      self.notifier.notify(RunEvent::WorkflowCompleted {
        run_id: run.run_id.clone(),
      });
    }
    self.snapshot(run).await;

    Ok(RunResult {
      run_id: run.run_id.clone(),
      status: RunStatus::Completed,
      resume_token: None,
      approve_prompt: None,
      final_output,
      final_structured_output: final_structured,
      error: None,
    })
  }

  async fn finalize_failed(
    &self,
    def: &WorkflowDef,
    run: &mut WorkflowRun,
    message: String,
    detail: Option<String>,
  ) -> Result<RunResult, RunnerError> {
    run.status = RunStatus::Failed;
    run.error = Some(message.clone());
    run.error_detail = detail;
    if !self.persist(run).await? {
      return self.finalize_cancelled(run).await;
    }

    error!(run_id = %run.run_id, error = %message, "workflow run failed");
    if def.config.notify_on_fail {
      self.notifier.notify(RunEvent::WorkflowFailed {
        run_id: run.run_id.clone(),
        error: message.clone(),
      });
    }
    self.snapshot(run).await;

    Ok(RunResult {
      run_id: run.run_id.clone(),
      status: RunStatus::Failed,
      resume_token: None,
      approve_prompt: None,
      final_output: None,
      final_structured_output: None,
      error: Some(message),
    })
  }

  async fn finalize_cancelled(&self, run: &mut WorkflowRun) -> Result<RunResult, RunnerError> {
    // Usually already marked by cancel(); this write lands only when the
    // token fired through shutdown or the executor reported cancellation
    // first.
    let transitioned = self
      .store
      .cancel_workflow_run(&run.run_id, CANCELLED_BY_USER)
      .await?;
    run.status = RunStatus::Cancelled;
    let error = run
      .error
      .get_or_insert_with(|| CANCELLED_BY_USER.to_string())
      .clone();
    run.resume_token = None;

    info!(run_id = %run.run_id, "workflow run cancelled mid-flight");
    // cancel() notifies when its own compare-and-set wins; here only the
    // winning transition notifies, so every cancellation path emits the
    // event exactly once.
    if transitioned {
      self.notifier.notify(RunEvent::WorkflowFailed {
        run_id: run.run_id.clone(),
        error,
      });
    }
    self.snapshot(run).await;

    Ok(RunResult {
      run_id: run.run_id.clone(),
      status: RunStatus::Cancelled,
      resume_token: None,
      approve_prompt: None,
      final_output: None,
      final_structured_output: None,
      error: run.error.clone(),
    })
  }

  async fn persist(&self, run: &mut WorkflowRun) -> Result<bool, RunnerError> {
    run.updated_at = Utc::now();
    Ok(self.store.update_workflow_run(run).await?)
  }

  async fn snapshot(&self, run: &WorkflowRun) {
    if let Some(sink) = &self.log_sink {
      let snapshot = RunSnapshot::from(run);
      if let Err(e) = sink.record(&snapshot).await {
        warn!(run_id = %run.run_id, error = %e, "run log sink write failed");
      }
    }
  }

  fn notify_step(
    &self,
    run: &WorkflowRun,
    step_id: &str,
    status: StepStatus,
    output_preview: Option<String>,
  ) {
    self.notifier.notify(RunEvent::StepCompleted {
      run_id: run.run_id.clone(),
      step_id: step_id.to_string(),
      status,
      output_preview,
    });
  }

  async fn dispatch_linked(
    &self,
    run: &WorkflowRun,
    actions: &[serde_json::Value],
    origin: &str,
  ) {
    if actions.is_empty() {
      return;
    }
    let Some(dispatcher) = &self.dispatcher else {
      return;
    };
    if let Err(e) = dispatcher
      .dispatch(&run.scope, actions, &run.step_results.0, &run.args.0)
      .await
    {
      warn!(run_id = %run.run_id, origin = %origin, error = %e, "linked action dispatch failed");
    }
  }
}

enum StepVerdict {
  Continue,
  Halt(RunResult),
}

fn merged_args(def: &WorkflowDef, mut args: HashMap<String, String>) -> HashMap<String, String> {
  for (name, arg) in &def.args {
    if !args.contains_key(name) {
      if let Some(default) = &arg.default {
        args.insert(name.clone(), default.clone());
      }
    }
  }
  args
}

/// Build the resolver context for the step at `index` from the run's
/// accumulated results.
fn ref_context(run: &WorkflowRun, ordered_ids: &[String], index: usize) -> RefContext {
  let steps: HashMap<String, serde_json::Value> = run
    .step_results
    .0
    .iter()
    .map(|(id, result)| (id.clone(), step_view(result)))
    .collect();
  let prev = last_completed_step(ordered_ids, &steps, index).map(str::to_string);
  RefContext::new(run.args.0.clone(), steps, prev)
}

fn step_view(result: &StepResult) -> serde_json::Value {
  serde_json::json!({
    "output": result.output,
    "data": result.structured_data,
    "approved": result.approved,
    "status": result.status,
  })
}

/// Derive the run's final output from the last completed step in
/// definition order.
fn final_outputs(
  def: &WorkflowDef,
  run: &WorkflowRun,
) -> (Option<String>, Option<serde_json::Value>) {
  for step in def.steps.iter().rev() {
    if let Some(result) = run.step_results.0.get(&step.id) {
      if result.status == StepStatus::Completed
        && (result.output.is_some() || result.structured_data.is_some())
      {
        return (result.output.clone(), result.structured_data.clone());
      }
    }
  }
  (None, None)
}

/// Extract a value from the step input via a dot-path. Paths beginning
/// with `$` resolve as ordinary references instead.
fn apply_transform(input: Option<&str>, path: &str, ctx: &RefContext) -> String {
  let path = path.trim();
  if path.starts_with('$') {
    return interpolate(path, ctx);
  }

  let Some(input) = input else {
    return String::new();
  };
  let Ok(mut current) = serde_json::from_str::<serde_json::Value>(input) else {
    return String::new();
  };
  for segment in path.split('.').filter(|s| !s.is_empty()) {
    match current.get(segment) {
      Some(next) => current = next.clone(),
      None => return String::new(),
    }
  }
  match current {
    serde_json::Value::String(s) => s,
    serde_json::Value::Null => String::new(),
    other => other.to_string(),
  }
}

/// Char-safe truncation with a marker. `None` leaves the text untouched.
fn truncate_chars(text: String, max_chars: Option<usize>) -> String {
  let Some(max) = max_chars else {
    return text;
  };
  if text.chars().count() <= max {
    return text;
  }
  let mut truncated: String = text.chars().take(max).collect();
  truncated.push_str(TRUNCATION_MARKER);
  truncated
}
