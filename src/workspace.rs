//! Workspace context passed explicitly into every component.
//!
//! A workspace is a project root plus the hidden folder that holds one
//! sub-directory per task. Task directories are the isolation boundary
//! between concurrently running loops.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TaskloopError};

/// Default name of the hidden folder under the project root
pub const DEFAULT_FOLDER: &str = ".taskloop";

/// Name of the cross-task insight document at the folder root
pub const INSIGHTS_FILE: &str = "insights.json";

/// Paths shared by every component working on one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceContext {
    /// Project root the worker operates in
    root: PathBuf,
    /// Absolute folder that holds per-task directories
    folder: PathBuf,
}

impl WorkspaceContext {
    /// Create a context rooted at `root` using the default folder name
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_folder(root, DEFAULT_FOLDER)
    }

    /// Create a context with a custom folder name (relative to root) or absolute path
    pub fn with_folder(root: impl AsRef<Path>, folder: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let folder = if folder.as_ref().is_absolute() {
            folder.as_ref().to_path_buf()
        } else {
            root.join(folder)
        };
        Self { root, folder }
    }

    /// Project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding every task directory
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Directory for a single task
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.folder.join(task_id)
    }

    /// Directory for a single task, refusing ids that would leave the folder
    pub fn checked_task_dir(&self, task_id: &str) -> Result<PathBuf> {
        validate_task_id(task_id)?;
        Ok(self.task_dir(task_id))
    }

    /// Path of the shared insight store
    pub fn insights_path(&self) -> PathBuf {
        self.folder.join(INSIGHTS_FILE)
    }
}

/// A task id must be exactly one plain path component.
///
/// Empty ids, `.`/`..`, separators and absolute paths are rejected, as is the
/// name of the shared insight file.
pub fn validate_task_id(task_id: &str) -> Result<()> {
    let mut components = Path::new(task_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == task_id && task_id != INSIGHTS_FILE => Ok(()),
        _ => Err(TaskloopError::InvalidState(format!("invalid task id {:?}", task_id))),
    }
}
