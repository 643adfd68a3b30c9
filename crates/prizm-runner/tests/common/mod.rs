#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prizm_executor::{
  ExecutorError, ExecutorInput, ExecutorResult, ExecutorStatus, StepExecutor,
};
use prizm_runner::{BoxError, DefinitionStore, LinkedActionDispatcher, RunLogSink, RunSnapshot};
use prizm_store::{SqliteStore, StepResult};
use prizm_workflow::WorkflowDef;
use tokio_util::sync::CancellationToken;

/// What the scripted executor does on one invocation. Behaviors are
/// consumed in order; an empty script succeeds with "ok".
pub enum Behavior {
  Succeed(&'static str),
  SucceedData(&'static str, serde_json::Value),
  Fail(&'static str),
  TimeoutStatus(&'static str),
  Blow(&'static str),
  /// Wait for the cancellation token, then report cancelled.
  HangUntilCancelled,
  /// Never resolve, even after cancellation. Watchdog bait.
  HangForever,
}

/// A step executor driven by a pre-loaded script, recording every input.
pub struct ScriptedExecutor {
  script: Mutex<VecDeque<Behavior>>,
  calls: Mutex<Vec<ExecutorInput>>,
  tokens: Mutex<Vec<CancellationToken>>,
}

impl ScriptedExecutor {
  pub fn new(script: Vec<Behavior>) -> Arc<Self> {
    Arc::new(Self {
      script: Mutex::new(script.into()),
      calls: Mutex::new(Vec::new()),
      tokens: Mutex::new(Vec::new()),
    })
  }

  pub fn calls(&self) -> Vec<ExecutorInput> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  /// Cancellation handles received so far, one per invocation.
  pub fn tokens(&self) -> Vec<CancellationToken> {
    self.tokens.lock().unwrap().clone()
  }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
  async fn execute(
    &self,
    _scope: &str,
    input: ExecutorInput,
    cancel: CancellationToken,
  ) -> Result<ExecutorResult, ExecutorError> {
    self.calls.lock().unwrap().push(input);
    self.tokens.lock().unwrap().push(cancel.clone());
    let behavior = self
      .script
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or(Behavior::Succeed("ok"));

    match behavior {
      Behavior::Succeed(output) => Ok(ExecutorResult::success(output)),
      Behavior::SucceedData(output, data) => {
        let mut result = ExecutorResult::success(output);
        result.structured_data = Some(data);
        Ok(result)
      }
      Behavior::Fail(message) => Ok(ExecutorResult::failed(message)),
      Behavior::TimeoutStatus(message) => {
        let mut result = ExecutorResult::failed(message);
        result.status = ExecutorStatus::Timeout;
        Ok(result)
      }
      Behavior::Blow(message) => Err(ExecutorError::with_detail(message, "stack trace here")),
      Behavior::HangUntilCancelled => {
        cancel.cancelled().await;
        Ok(ExecutorResult::cancelled())
      }
      Behavior::HangForever => std::future::pending().await,
    }
  }
}

/// In-memory definition store for resume tests.
#[derive(Default)]
pub struct StaticDefinitions {
  defs: Mutex<HashMap<String, WorkflowDef>>,
}

impl StaticDefinitions {
  pub fn with(def: &WorkflowDef) -> Arc<Self> {
    let store = Self::default();
    store
      .defs
      .lock()
      .unwrap()
      .insert(def.name.clone(), def.clone());
    Arc::new(store)
  }
}

#[async_trait]
impl DefinitionStore for StaticDefinitions {
  async fn get_by_name(&self, name: &str, _scope: &str) -> Result<Option<WorkflowDef>, BoxError> {
    Ok(self.defs.lock().unwrap().get(name).cloned())
  }
}

/// Records every dispatch; optionally fails each call.
#[derive(Default)]
pub struct RecordingDispatcher {
  pub fail: bool,
  calls: Mutex<Vec<Vec<serde_json::Value>>>,
}

impl RecordingDispatcher {
  pub fn new(fail: bool) -> Arc<Self> {
    Arc::new(Self {
      fail,
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn dispatches(&self) -> Vec<Vec<serde_json::Value>> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl LinkedActionDispatcher for RecordingDispatcher {
  async fn dispatch(
    &self,
    _scope: &str,
    actions: &[serde_json::Value],
    _step_results: &HashMap<String, StepResult>,
    _args: &HashMap<String, String>,
  ) -> Result<(), BoxError> {
    self.calls.lock().unwrap().push(actions.to_vec());
    if self.fail {
      return Err("dispatcher unavailable".into());
    }
    Ok(())
  }
}

/// Records every snapshot the runner emits.
#[derive(Default)]
pub struct RecordingSink {
  snapshots: Mutex<Vec<RunSnapshot>>,
}

impl RecordingSink {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn snapshots(&self) -> Vec<RunSnapshot> {
    self.snapshots.lock().unwrap().clone()
  }
}

#[async_trait]
impl RunLogSink for RecordingSink {
  async fn record(&self, snapshot: &RunSnapshot) -> Result<(), BoxError> {
    self.snapshots.lock().unwrap().push(snapshot.clone());
    Ok(())
  }
}

pub async fn memory_store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap())
}

/// Build a workflow definition from step JSON fragments.
pub fn workflow(name: &str, config: serde_json::Value, steps: Vec<serde_json::Value>) -> WorkflowDef {
  serde_json::from_value(serde_json::json!({
    "name": name,
    "steps": steps,
    "config": config,
  }))
  .unwrap()
}

pub fn agent_step(id: &str, prompt: &str) -> serde_json::Value {
  serde_json::json!({ "id": id, "type": "agent", "prompt": prompt })
}
