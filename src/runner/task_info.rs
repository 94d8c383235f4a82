//! Durable per-task attempt history (`info.json`)

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactStore, INFO_FILE};
use crate::error::Result;

/// Longest stack/detail text kept per error entry
pub const MAX_STACK_CHARS: usize = 2000;

/// Most recent failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub attempt: u32,
}

/// One failed attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub attempt: u32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_stack: Option<String>,
}

/// One worker invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub attempt: u32,
    pub re_researched: bool,
}

/// Attempt counters and history that survive process restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskInfo {
    pub attempts: u32,
    pub first_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<LastError>,
    pub error_history: Vec<ErrorRecord>,
    pub re_researched: bool,
    pub history: Vec<HistoryEntry>,
}

impl TaskInfo {
    /// Load the task's info, or a fresh one when missing or unreadable
    pub fn load(store: &dyn ArtifactStore, task_id: &str) -> Self {
        match store.read(task_id, INFO_FILE) {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Malformed {} for task {}: {}", INFO_FILE, task_id, e);
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Failed to read {} for task {}: {}", INFO_FILE, task_id, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn ArtifactStore, task_id: &str) -> Result<()> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        store.write(task_id, INFO_FILE, &text)
    }

    /// Count a new worker invocation and return its attempt number
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) -> u32 {
        self.attempts += 1;
        self.first_run.get_or_insert(now);
        self.last_run = Some(now);
        self.attempts
    }

    pub fn record_success(&mut self, attempt: u32, now: DateTime<Utc>) {
        self.last_error = None;
        self.push_history(attempt, now);
    }

    pub fn record_failure(&mut self, attempt: u32, message: &str, stack: Option<&str>, now: DateTime<Utc>) {
        self.last_error = Some(LastError {
            message: message.to_string(),
            timestamp: now,
            attempt,
        });
        self.error_history.push(ErrorRecord {
            timestamp: now,
            attempt,
            message: message.to_string(),
            truncated_stack: stack.map(truncate_stack),
        });
        self.push_history(attempt, now);
    }

    fn push_history(&mut self, attempt: u32, now: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            timestamp: now,
            attempt,
            re_researched: self.re_researched,
        });
    }
}

fn truncate_stack(stack: &str) -> String {
    match stack.char_indices().nth(MAX_STACK_CHARS) {
        Some((cut, _)) => format!("{}...", &stack[..cut]),
        None => stack.to_string(),
    }
}
