//! Shared insight store (`insights.json`)
//!
//! Every task loop appends a completion insight to one file in the workspace
//! folder. Concurrent loops serialize read-merge-write through a mutex keyed by
//! file path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Result, TaskloopError};

static FILE_LOCKS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| std::sync::Mutex::new(HashMap::new()));

fn lock_for(path: &Path) -> Result<Arc<Mutex<()>>> {
    let mut locks = FILE_LOCKS
        .lock()
        .map_err(|e| TaskloopError::Storage(format!("insight lock registry poisoned: {}", e)))?;
    Ok(locks.entry(path.to_path_buf()).or_default().clone())
}

/// What one finished task leaves for the others
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// Task id; one insight per task
    pub id: String,
    pub summary: String,
    pub iterations: u32,
    pub completed_at: DateTime<Utc>,
}

/// Append-mostly JSON array of insights, merged by id
#[derive(Debug, Clone)]
pub struct InsightStore {
    path: PathBuf,
}

impl InsightStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, including ones written by other tools in other shapes.
    ///
    /// A file that is not a JSON array reads as empty.
    pub async fn entries(&self) -> Result<Vec<Value>> {
        match self.read_entries().await {
            Ok(entries) => Ok(entries),
            Err(TaskloopError::Storage(message)) => {
                warn!("{}", message);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Entries on disk; `Storage` error when the file exists but is not a JSON array
    async fn read_entries(&self) -> Result<Vec<Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(_) | Err(_) => Err(TaskloopError::Storage(format!(
                "insight store {} is not a JSON array",
                self.path.display()
            ))),
        }
    }

    /// Entries that parse as insights
    pub async fn load(&self) -> Result<Vec<Insight>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    /// Insert or replace the insight with the same id.
    ///
    /// A malformed store is left untouched and reported as an error.
    pub async fn record(&self, insight: &Insight) -> Result<()> {
        let lock = lock_for(&self.path)?;
        let _guard = lock.lock().await;

        let mut entries = self.read_entries().await?;
        let value = serde_json::to_value(insight)?;
        let existing = entries
            .iter()
            .position(|e| e.get("id").and_then(Value::as_str) == Some(insight.id.as_str()));
        match existing {
            Some(pos) => entries[pos] = value,
            None => entries.push(value),
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut text = serde_json::to_string_pretty(&entries)?;
        text.push('\n');
        tokio::fs::write(&self.path, text).await?;
        debug!("Recorded insight for {} in {}", insight.id, self.path.display());
        Ok(())
    }
}
