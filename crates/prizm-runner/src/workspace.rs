//! Workspace directory resolution and cleanup.
//!
//! Every run gets a working directory for its executor, laid out under one
//! root as `<root>/<workflow_name>/...`. The mode controls how much of that
//! tree runs share:
//!
//! - `shared`: every run reuses `<workflow>/shared`
//! - `isolated`: each run gets `<workflow>/runs/<run_id>` and nothing else
//! - `dual` (default): `<workflow>/runs/<run_id>` plus the cross-run
//!   `<workflow>/persistent` directory for long-lived artifacts

use std::io;
use std::path::{Path, PathBuf};

use prizm_workflow::WorkspaceMode;
use tokio::fs;

/// Reserved metadata subtree, always preserved by [`clean_workspace`].
pub const META_DIR: &str = ".meta";

/// Resolved directories for one run.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
  /// Directory handed to the executor as its working directory.
  pub primary: PathBuf,
  /// Cross-run persistent directory (`dual` mode only).
  pub persistent: Option<PathBuf>,
}

/// Resolve and create the directories for a run.
pub async fn resolve_workspace(
  root: &Path,
  workflow_name: &str,
  run_id: &str,
  mode: WorkspaceMode,
) -> io::Result<WorkspacePaths> {
  let workflow_dir = root.join(workflow_name);
  match mode {
    WorkspaceMode::Shared => {
      let primary = workflow_dir.join("shared");
      fs::create_dir_all(&primary).await?;
      Ok(WorkspacePaths {
        primary,
        persistent: None,
      })
    }
    WorkspaceMode::Isolated => {
      let primary = workflow_dir.join("runs").join(run_id);
      fs::create_dir_all(&primary).await?;
      Ok(WorkspacePaths {
        primary,
        persistent: None,
      })
    }
    WorkspaceMode::Dual => {
      let primary = workflow_dir.join("runs").join(run_id);
      let persistent = workflow_dir.join("persistent");
      fs::create_dir_all(&primary).await?;
      fs::create_dir_all(&persistent).await?;
      Ok(WorkspacePaths {
        primary,
        persistent: Some(persistent),
      })
    }
  }
}

/// Wipe the workflow's workspace, preserving the reserved `.meta` subtree.
pub async fn clean_workspace(root: &Path, workflow_name: &str) -> io::Result<()> {
  let workflow_dir = root.join(workflow_name);
  if !fs::try_exists(&workflow_dir).await? {
    return Ok(());
  }

  let mut entries = fs::read_dir(&workflow_dir).await?;
  while let Some(entry) = entries.next_entry().await? {
    if entry.file_name() == META_DIR {
      continue;
    }
    let path = entry.path();
    if entry.file_type().await?.is_dir() {
      fs::remove_dir_all(&path).await?;
    } else {
      fs::remove_file(&path).await?;
    }
  }

  Ok(())
}
