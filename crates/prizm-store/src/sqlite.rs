use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::types::{TaskFilter, TaskRun, TaskStatus, WorkflowRun};
use crate::{AGE_EXCEEDED_ERROR, Error, RESTART_INTERRUPTED_ERROR, RunStore};

use async_trait::async_trait;

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a store over an existing connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open a store at `url` (e.g. `sqlite:prizm.db` or `sqlite::memory:`),
  /// creating the database file and schema as needed.
  ///
  /// SQLite serializes writers; a single connection keeps read-modify-write
  /// sequences effectively atomic per record.
  pub async fn connect(url: &str) -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str(url)
      .map_err(sqlx::Error::from)?
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect_with(options)
      .await?;
    let store = Self::new(pool);
    store.init().await?;
    Ok(store)
  }

  /// Create the schema. Idempotent.
  pub async fn init(&self) -> Result<(), Error> {
    sqlx::query(
      r#"
            CREATE TABLE IF NOT EXISTS workflow_runs (
                run_id TEXT PRIMARY KEY,
                workflow_name TEXT NOT NULL,
                scope TEXT NOT NULL,
                status TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                current_step_index INTEGER NOT NULL,
                step_results TEXT NOT NULL,
                resume_token TEXT,
                args TEXT NOT NULL,
                error TEXT,
                error_detail TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
    )
    .execute(&self.pool)
    .await?;

    sqlx::query(
      r#"
            CREATE TABLE IF NOT EXISTS task_runs (
                task_id TEXT PRIMARY KEY,
                scope TEXT NOT NULL,
                label TEXT,
                status TEXT NOT NULL,
                session_id TEXT,
                input TEXT NOT NULL,
                output TEXT,
                structured_data TEXT,
                artifacts TEXT,
                error TEXT,
                error_detail TEXT,
                trigger_type TEXT NOT NULL,
                parent_session_id TEXT,
                created_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER
            )
            "#,
    )
    .execute(&self.pool)
    .await?;

    sqlx::query(
      "CREATE INDEX IF NOT EXISTS idx_workflow_runs_scope ON workflow_runs(scope, created_at)",
    )
    .execute(&self.pool)
    .await?;
    sqlx::query(
      "CREATE INDEX IF NOT EXISTS idx_workflow_runs_resume_token ON workflow_runs(resume_token)",
    )
    .execute(&self.pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_task_runs_scope ON task_runs(scope, created_at)")
      .execute(&self.pool)
      .await?;

    Ok(())
  }
}

const RUN_COLUMNS: &str = "run_id, workflow_name, scope, status, trigger_type, \
     current_step_index, step_results, resume_token, args, error, error_detail, \
     created_at, updated_at";

const TASK_COLUMNS: &str = "task_id, scope, label, status, session_id, input, output, \
     structured_data, artifacts, error, error_detail, trigger_type, parent_session_id, \
     created_at, finished_at, duration_ms";

#[async_trait]
impl RunStore for SqliteStore {
  async fn create_workflow_run(&self, run: &WorkflowRun) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO workflow_runs (run_id, workflow_name, scope, status, trigger_type,
                current_step_index, step_results, resume_token, args, error, error_detail,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&run.run_id)
    .bind(&run.workflow_name)
    .bind(&run.scope)
    .bind(run.status)
    .bind(run.trigger_type)
    .bind(run.current_step_index)
    .bind(&run.step_results)
    .bind(&run.resume_token)
    .bind(&run.args)
    .bind(&run.error)
    .bind(&run.error_detail)
    .bind(run.created_at)
    .bind(run.updated_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_workflow_run(&self, run_id: &str) -> Result<Option<WorkflowRun>, Error> {
    let run = sqlx::query_as(&format!(
      "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE run_id = ?"
    ))
    .bind(run_id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(run)
  }

  async fn find_by_resume_token(&self, token: &str) -> Result<Option<WorkflowRun>, Error> {
    let run = sqlx::query_as(&format!(
      "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE resume_token = ?"
    ))
    .bind(token)
    .fetch_optional(&self.pool)
    .await?;

    Ok(run)
  }

  async fn update_workflow_run(&self, run: &WorkflowRun) -> Result<bool, Error> {
    let result = sqlx::query(
      r#"
            UPDATE workflow_runs
            SET status = ?, current_step_index = ?, step_results = ?, resume_token = ?,
                error = ?, error_detail = ?, updated_at = ?
            WHERE run_id = ? AND status NOT IN ('completed', 'failed', 'cancelled')
            "#,
    )
    .bind(run.status)
    .bind(run.current_step_index)
    .bind(&run.step_results)
    .bind(&run.resume_token)
    .bind(&run.error)
    .bind(&run.error_detail)
    .bind(run.updated_at)
    .bind(&run.run_id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn claim_paused_run(&self, run: &WorkflowRun, token: &str) -> Result<bool, Error> {
    let result = sqlx::query(
      r#"
            UPDATE workflow_runs
            SET status = 'running', resume_token = NULL, current_step_index = ?,
                step_results = ?, updated_at = ?
            WHERE run_id = ? AND resume_token = ? AND status = 'paused'
            "#,
    )
    .bind(run.current_step_index)
    .bind(&run.step_results)
    .bind(run.updated_at)
    .bind(&run.run_id)
    .bind(token)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn cancel_workflow_run(&self, run_id: &str, reason: &str) -> Result<bool, Error> {
    let result = sqlx::query(
      r#"
            UPDATE workflow_runs
            SET status = 'cancelled', resume_token = NULL, error = ?, updated_at = ?
            WHERE run_id = ? AND status NOT IN ('completed', 'failed', 'cancelled')
            "#,
    )
    .bind(reason)
    .bind(Utc::now())
    .bind(run_id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn list_workflow_runs(&self, scope: &str) -> Result<Vec<WorkflowRun>, Error> {
    let runs = sqlx::query_as(&format!(
      "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE scope = ? ORDER BY created_at DESC"
    ))
    .bind(scope)
    .fetch_all(&self.pool)
    .await?;

    Ok(runs)
  }

  async fn delete_workflow_run(&self, run_id: &str) -> Result<bool, Error> {
    let result = sqlx::query("DELETE FROM workflow_runs WHERE run_id = ?")
      .bind(run_id)
      .execute(&self.pool)
      .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn create_task_run(&self, task: &TaskRun) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO task_runs (task_id, scope, label, status, session_id, input, output,
                structured_data, artifacts, error, error_detail, trigger_type,
                parent_session_id, created_at, finished_at, duration_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&task.task_id)
    .bind(&task.scope)
    .bind(&task.label)
    .bind(task.status)
    .bind(&task.session_id)
    .bind(&task.input)
    .bind(&task.output)
    .bind(&task.structured_data)
    .bind(&task.artifacts)
    .bind(&task.error)
    .bind(&task.error_detail)
    .bind(task.trigger_type)
    .bind(&task.parent_session_id)
    .bind(task.created_at)
    .bind(task.finished_at)
    .bind(task.duration_ms)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_task_run(&self, task_id: &str) -> Result<Option<TaskRun>, Error> {
    let task = sqlx::query_as(&format!(
      "SELECT {TASK_COLUMNS} FROM task_runs WHERE task_id = ?"
    ))
    .bind(task_id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(task)
  }

  async fn update_task_run(&self, task: &TaskRun) -> Result<bool, Error> {
    let result = sqlx::query(
      r#"
            UPDATE task_runs
            SET status = ?, session_id = ?, output = ?, structured_data = ?, artifacts = ?,
                error = ?, error_detail = ?, finished_at = ?, duration_ms = ?
            WHERE task_id = ? AND status NOT IN ('completed', 'failed', 'cancelled', 'timeout')
            "#,
    )
    .bind(task.status)
    .bind(&task.session_id)
    .bind(&task.output)
    .bind(&task.structured_data)
    .bind(&task.artifacts)
    .bind(&task.error)
    .bind(&task.error_detail)
    .bind(task.finished_at)
    .bind(task.duration_ms)
    .bind(&task.task_id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn mark_task_terminal(
    &self,
    task_id: &str,
    status: TaskStatus,
    error: Option<&str>,
    error_detail: Option<&str>,
    finished_at: DateTime<Utc>,
    duration_ms: Option<i64>,
  ) -> Result<bool, Error> {
    let result = sqlx::query(
      r#"
            UPDATE task_runs
            SET status = ?, error = ?, error_detail = ?, finished_at = ?, duration_ms = ?
            WHERE task_id = ? AND status NOT IN ('completed', 'failed', 'cancelled', 'timeout')
            "#,
    )
    .bind(status)
    .bind(error)
    .bind(error_detail)
    .bind(finished_at)
    .bind(duration_ms)
    .bind(task_id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn list_task_runs(&self, scope: &str, filter: &TaskFilter) -> Result<Vec<TaskRun>, Error> {
    let mut sql = format!("SELECT {TASK_COLUMNS} FROM task_runs WHERE scope = ?");
    if filter.status.is_some() {
      sql.push_str(" AND status = ?");
    }
    if filter.parent_session_id.is_some() {
      sql.push_str(" AND parent_session_id = ?");
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut query = sqlx::query_as(&sql).bind(scope);
    if let Some(status) = filter.status {
      query = query.bind(status);
    }
    if let Some(parent) = &filter.parent_session_id {
      query = query.bind(parent.clone());
    }

    let tasks = query.fetch_all(&self.pool).await?;
    Ok(tasks)
  }

  async fn delete_task_run(&self, task_id: &str) -> Result<bool, Error> {
    let result = sqlx::query("DELETE FROM task_runs WHERE task_id = ?")
      .bind(task_id)
      .execute(&self.pool)
      .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn recover_stale_on_startup(&self) -> Result<u64, Error> {
    let now = Utc::now();

    let runs = sqlx::query(
      r#"
            UPDATE workflow_runs
            SET status = 'failed', error = ?, updated_at = ?
            WHERE status IN ('pending', 'running')
            "#,
    )
    .bind(RESTART_INTERRUPTED_ERROR)
    .bind(now)
    .execute(&self.pool)
    .await?;

    let tasks = sqlx::query(
      r#"
            UPDATE task_runs
            SET status = 'failed', error = ?, finished_at = ?
            WHERE status IN ('pending', 'running')
            "#,
    )
    .bind(RESTART_INTERRUPTED_ERROR)
    .bind(now)
    .execute(&self.pool)
    .await?;

    Ok(runs.rows_affected() + tasks.rows_affected())
  }

  async fn recover_stale_by_age(&self, max_age_days: u32) -> Result<u64, Error> {
    let now = Utc::now();
    let cutoff = now - Duration::days(i64::from(max_age_days));

    let runs = sqlx::query(
      r#"
            UPDATE workflow_runs
            SET status = 'failed', error = ?, updated_at = ?
            WHERE status IN ('pending', 'running') AND created_at < ?
            "#,
    )
    .bind(AGE_EXCEEDED_ERROR)
    .bind(now)
    .bind(cutoff)
    .execute(&self.pool)
    .await?;

    let tasks = sqlx::query(
      r#"
            UPDATE task_runs
            SET status = 'failed', error = ?, finished_at = ?
            WHERE status IN ('pending', 'running') AND created_at < ?
            "#,
    )
    .bind(AGE_EXCEEDED_ERROR)
    .bind(now)
    .bind(cutoff)
    .execute(&self.pool)
    .await?;

    Ok(runs.rows_affected() + tasks.rows_affected())
  }

  async fn prune_older_than(&self, retention_days: u32) -> Result<u64, Error> {
    let cutoff = Utc::now() - Duration::days(i64::from(retention_days));

    let runs = sqlx::query(
      r#"
            DELETE FROM workflow_runs
            WHERE status IN ('completed', 'failed', 'cancelled') AND created_at < ?
            "#,
    )
    .bind(cutoff)
    .execute(&self.pool)
    .await?;

    let tasks = sqlx::query(
      r#"
            DELETE FROM task_runs
            WHERE status IN ('completed', 'failed', 'cancelled', 'timeout') AND created_at < ?
            "#,
    )
    .bind(cutoff)
    .execute(&self.pool)
    .await?;

    Ok(runs.rows_affected() + tasks.rows_affected())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{RunStatus, StepResult, TriggerType};
  use std::collections::HashMap;

  async fn memory_store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
  }

  fn sample_run(run_id: &str) -> WorkflowRun {
    let mut args = HashMap::new();
    args.insert("topic".to_string(), "standup".to_string());
    WorkflowRun::new(run_id, "daily-briefing", "alice", TriggerType::Manual, args)
  }

  #[tokio::test]
  async fn test_workflow_run_roundtrip() {
    let store = memory_store().await;

    let mut run = sample_run("run-1");
    run.status = RunStatus::Running;
    run
      .step_results
      .0
      .insert("collect".to_string(), StepResult::started("collect", "agent"));
    store.create_workflow_run(&run).await.unwrap();

    let loaded = store.get_workflow_run("run-1").await.unwrap().unwrap();
    assert_eq!(loaded.workflow_name, "daily-briefing");
    assert_eq!(loaded.status, RunStatus::Running);
    assert_eq!(loaded.args.0["topic"], "standup");
    assert!(loaded.step_results.0.contains_key("collect"));

    assert!(store.get_workflow_run("absent").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_update_refuses_terminal_rows() {
    let store = memory_store().await;

    let mut run = sample_run("run-1");
    run.status = RunStatus::Completed;
    store.create_workflow_run(&run).await.unwrap();

    run.status = RunStatus::Running;
    run.updated_at = Utc::now();
    assert!(!store.update_workflow_run(&run).await.unwrap());

    let loaded = store.get_workflow_run("run-1").await.unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Completed);
  }

  #[tokio::test]
  async fn test_cancel_is_a_compare_and_set() {
    let store = memory_store().await;

    let mut run = sample_run("run-1");
    run.status = RunStatus::Running;
    store.create_workflow_run(&run).await.unwrap();

    assert!(
      store
        .cancel_workflow_run("run-1", "Cancelled by user")
        .await
        .unwrap()
    );
    let loaded = store.get_workflow_run("run-1").await.unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Cancelled);
    assert_eq!(loaded.error.as_deref(), Some("Cancelled by user"));

    // Second cancel and cancel-after-terminal both miss.
    assert!(
      !store
        .cancel_workflow_run("run-1", "Cancelled by user")
        .await
        .unwrap()
    );
    assert!(!store.cancel_workflow_run("absent", "x").await.unwrap());
  }

  #[tokio::test]
  async fn test_find_by_resume_token() {
    let store = memory_store().await;

    let mut run = sample_run("run-1");
    run.status = RunStatus::Paused;
    run.resume_token = Some("tok-abc".to_string());
    store.create_workflow_run(&run).await.unwrap();

    let found = store.find_by_resume_token("tok-abc").await.unwrap();
    assert_eq!(found.unwrap().run_id, "run-1");
    assert!(store.find_by_resume_token("tok-xyz").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_claim_paused_run_consumes_token_once() {
    let store = memory_store().await;

    let mut run = sample_run("run-1");
    run.status = RunStatus::Paused;
    run.resume_token = Some("tok".to_string());
    store.create_workflow_run(&run).await.unwrap();

    run.status = RunStatus::Running;
    run.resume_token = None;
    run.updated_at = Utc::now();
    assert!(store.claim_paused_run(&run, "tok").await.unwrap());

    let loaded = store.get_workflow_run("run-1").await.unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Running);
    assert_eq!(loaded.resume_token, None);

    // The token is gone and the run is no longer paused: every later
    // claim with the same token misses.
    assert!(!store.claim_paused_run(&run, "tok").await.unwrap());
  }

  #[tokio::test]
  async fn test_mark_task_terminal_once() {
    let store = memory_store().await;

    let task = TaskRun::new("task-1", "alice", "summarize inbox", TriggerType::Manual);
    store.create_task_run(&task).await.unwrap();

    let now = Utc::now();
    assert!(
      store
        .mark_task_terminal("task-1", TaskStatus::Cancelled, Some("Cancelled by user"), None, now, Some(12))
        .await
        .unwrap()
    );
    // Watchdog racing an explicit cancel converges: second write misses.
    assert!(
      !store
        .mark_task_terminal("task-1", TaskStatus::Timeout, Some("watchdog"), None, now, None)
        .await
        .unwrap()
    );

    let loaded = store.get_task_run("task-1").await.unwrap().unwrap();
    assert_eq!(loaded.status, TaskStatus::Cancelled);
    assert_eq!(loaded.duration_ms, Some(12));
  }

  #[tokio::test]
  async fn test_list_task_runs_filtered() {
    let store = memory_store().await;

    let mut a = TaskRun::new("task-a", "alice", "one", TriggerType::Manual);
    a.parent_session_id = Some("sess-1".to_string());
    let mut b = TaskRun::new("task-b", "alice", "two", TriggerType::Cron);
    b.status = TaskStatus::Completed;
    let c = TaskRun::new("task-c", "bob", "three", TriggerType::Manual);
    store.create_task_run(&a).await.unwrap();
    store.create_task_run(&b).await.unwrap();
    store.create_task_run(&c).await.unwrap();

    let all_alice = store
      .list_task_runs("alice", &TaskFilter::default())
      .await
      .unwrap();
    assert_eq!(all_alice.len(), 2);

    let running = store
      .list_task_runs(
        "alice",
        &TaskFilter {
          status: Some(TaskStatus::Running),
          ..Default::default()
        },
      )
      .await
      .unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].task_id, "task-a");

    let by_parent = store
      .list_task_runs(
        "alice",
        &TaskFilter {
          parent_session_id: Some("sess-1".to_string()),
          ..Default::default()
        },
      )
      .await
      .unwrap();
    assert_eq!(by_parent.len(), 1);
  }

  #[tokio::test]
  async fn test_startup_recovery_after_restart() {
    // File-backed store so a second handle sees the first one's data.
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("prizm.db").display());

    {
      let store = SqliteStore::connect(&url).await.unwrap();
      let mut running = sample_run("run-running");
      running.status = RunStatus::Running;
      store.create_workflow_run(&running).await.unwrap();

      let mut paused = sample_run("run-paused");
      paused.status = RunStatus::Paused;
      paused.resume_token = Some("tok".to_string());
      store.create_workflow_run(&paused).await.unwrap();

      let task = TaskRun::new("task-1", "alice", "work", TriggerType::Manual);
      store.create_task_run(&task).await.unwrap();
    }

    // "Restart": fresh handle over the same file.
    let store = SqliteStore::connect(&url).await.unwrap();
    let recovered = store.recover_stale_on_startup().await.unwrap();
    assert_eq!(recovered, 2);

    let running = store.get_workflow_run("run-running").await.unwrap().unwrap();
    assert_eq!(running.status, RunStatus::Failed);
    assert_eq!(running.error.as_deref(), Some(RESTART_INTERRUPTED_ERROR));

    // Pause state is fully durable and survives the sweep.
    let paused = store.get_workflow_run("run-paused").await.unwrap().unwrap();
    assert_eq!(paused.status, RunStatus::Paused);
    assert_eq!(paused.resume_token.as_deref(), Some("tok"));

    let task = store.get_task_run("task-1").await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some(RESTART_INTERRUPTED_ERROR));
  }

  #[tokio::test]
  async fn test_recover_stale_by_age() {
    let store = memory_store().await;

    let mut old_running = sample_run("run-old");
    old_running.status = RunStatus::Running;
    old_running.created_at = Utc::now() - Duration::days(10);
    store.create_workflow_run(&old_running).await.unwrap();

    let mut fresh_running = sample_run("run-fresh");
    fresh_running.status = RunStatus::Running;
    store.create_workflow_run(&fresh_running).await.unwrap();

    let recovered = store.recover_stale_by_age(7).await.unwrap();
    assert_eq!(recovered, 1);

    let old = store.get_workflow_run("run-old").await.unwrap().unwrap();
    assert_eq!(old.status, RunStatus::Failed);
    assert_eq!(old.error.as_deref(), Some(AGE_EXCEEDED_ERROR));
    let fresh = store.get_workflow_run("run-fresh").await.unwrap().unwrap();
    assert_eq!(fresh.status, RunStatus::Running);
  }

  #[tokio::test]
  async fn test_prune_spares_non_terminal_records() {
    let store = memory_store().await;
    let old = Utc::now() - Duration::days(90);

    let mut done = sample_run("run-done");
    done.status = RunStatus::Completed;
    done.created_at = old;
    store.create_workflow_run(&done).await.unwrap();

    let mut paused = sample_run("run-paused");
    paused.status = RunStatus::Paused;
    paused.resume_token = Some("tok".to_string());
    paused.created_at = old;
    store.create_workflow_run(&paused).await.unwrap();

    let mut running = sample_run("run-running");
    running.status = RunStatus::Running;
    running.created_at = old;
    store.create_workflow_run(&running).await.unwrap();

    let mut old_task = TaskRun::new("task-old", "alice", "x", TriggerType::Cron);
    old_task.status = TaskStatus::Timeout;
    old_task.created_at = old;
    store.create_task_run(&old_task).await.unwrap();

    let pruned = store.prune_older_than(30).await.unwrap();
    assert_eq!(pruned, 2);

    assert!(store.get_workflow_run("run-done").await.unwrap().is_none());
    assert!(store.get_workflow_run("run-paused").await.unwrap().is_some());
    assert!(store.get_workflow_run("run-running").await.unwrap().is_some());
    assert!(store.get_task_run("task-old").await.unwrap().is_none());
  }
}
