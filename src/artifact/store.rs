//! ArtifactStore - named markdown/JSON files under a task-scoped directory.
//!
//! `FsArtifactStore` is the real filesystem accessor. `MemoryArtifactStore`
//! implements the same trait over a map so the oracle and controller can be
//! exercised without touching disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{Result, TaskloopError};
use crate::workspace::WorkspaceContext;

/// Read/write/delete access to task artifacts
pub trait ArtifactStore: Send + Sync {
    /// Absolute path an artifact resolves to (used for prompt placeholders)
    fn path(&self, task_id: &str, name: &str) -> PathBuf;

    /// Read an artifact; `Ok(None)` when it does not exist
    fn read(&self, task_id: &str, name: &str) -> Result<Option<String>>;

    /// Write (create or replace) an artifact
    fn write(&self, task_id: &str, name: &str, content: &str) -> Result<()>;

    /// Delete an artifact; returns whether something was removed
    fn delete(&self, task_id: &str, name: &str) -> Result<bool>;

    /// Whether an artifact exists
    fn exists(&self, task_id: &str, name: &str) -> bool;

    /// Rename an artifact, replacing any existing target; returns whether the source existed
    fn rename(&self, task_id: &str, from: &str, to: &str) -> Result<bool>;

    /// Remove every artifact of a task except the named ones; returns how many were removed
    fn clear_except(&self, task_id: &str, keep: &[&str]) -> Result<usize>;
}

/// Filesystem-backed store rooted at a workspace folder
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    workspace: WorkspaceContext,
}

impl FsArtifactStore {
    /// Create a store for the given workspace
    pub fn new(workspace: WorkspaceContext) -> Self {
        Self { workspace }
    }

    /// The workspace this store writes into
    pub fn workspace(&self) -> &WorkspaceContext {
        &self.workspace
    }
}

impl ArtifactStore for FsArtifactStore {
    fn path(&self, task_id: &str, name: &str) -> PathBuf {
        self.workspace.task_dir(task_id).join(name)
    }

    fn read(&self, task_id: &str, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(task_id, name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, task_id: &str, name: &str, content: &str) -> Result<()> {
        let dir = self.workspace.checked_task_dir(task_id)?;
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(name), content)?;
        Ok(())
    }

    fn delete(&self, task_id: &str, name: &str) -> Result<bool> {
        let dir = self.workspace.checked_task_dir(task_id)?;
        match fs::remove_file(dir.join(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, task_id: &str, name: &str) -> bool {
        self.path(task_id, name).is_file()
    }

    fn rename(&self, task_id: &str, from: &str, to: &str) -> Result<bool> {
        let dir = self.workspace.checked_task_dir(task_id)?;
        let source = dir.join(from);
        if !source.is_file() {
            return Ok(false);
        }
        fs::rename(&source, dir.join(to))?;
        Ok(true)
    }

    fn clear_except(&self, task_id: &str, keep: &[&str]) -> Result<usize> {
        let dir = self.workspace.checked_task_dir(task_id)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if keep.iter().any(|name| entry.file_name() == *name) {
                continue;
            }
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
            removed += 1;
        }
        Ok(removed)
    }
}

/// In-memory store keyed by (task, name)
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    root: PathBuf,
    files: RwLock<BTreeMap<(String, String), String>>,
}

impl MemoryArtifactStore {
    /// Create an empty store; paths resolve under `/memory`
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/memory"),
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Names of every artifact held for a task
    pub fn names(&self, task_id: &str) -> Vec<String> {
        self.files
            .read()
            .map(|files| {
                files
                    .keys()
                    .filter(|(task, _)| task == task_id)
                    .map(|(_, name)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn key(task_id: &str, name: &str) -> (String, String) {
        (task_id.to_string(), name.to_string())
    }
}

fn lock_error(e: impl std::fmt::Display) -> TaskloopError {
    TaskloopError::Storage(format!("Artifact store lock poisoned: {}", e))
}

impl ArtifactStore for MemoryArtifactStore {
    fn path(&self, task_id: &str, name: &str) -> PathBuf {
        self.root.join(task_id).join(name)
    }

    fn read(&self, task_id: &str, name: &str) -> Result<Option<String>> {
        let files = self.files.read().map_err(lock_error)?;
        Ok(files.get(&Self::key(task_id, name)).cloned())
    }

    fn write(&self, task_id: &str, name: &str, content: &str) -> Result<()> {
        let mut files = self.files.write().map_err(lock_error)?;
        files.insert(Self::key(task_id, name), content.to_string());
        Ok(())
    }

    fn delete(&self, task_id: &str, name: &str) -> Result<bool> {
        let mut files = self.files.write().map_err(lock_error)?;
        Ok(files.remove(&Self::key(task_id, name)).is_some())
    }

    fn exists(&self, task_id: &str, name: &str) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(&Self::key(task_id, name)))
            .unwrap_or(false)
    }

    fn rename(&self, task_id: &str, from: &str, to: &str) -> Result<bool> {
        let mut files = self.files.write().map_err(lock_error)?;
        match files.remove(&Self::key(task_id, from)) {
            Some(content) => {
                files.insert(Self::key(task_id, to), content);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear_except(&self, task_id: &str, keep: &[&str]) -> Result<usize> {
        let mut files = self.files.write().map_err(lock_error)?;
        let before = files.len();
        files.retain(|(task, name), _| task != task_id || keep.iter().any(|k| *k == name.as_str()));
        Ok(before - files.len())
    }
}
