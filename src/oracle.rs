//! CompletionOracle - reads artifact signals to judge loop progress.
//!
//! Every query is a pure read. Missing or unreadable files degrade to
//! `0` / `false` with a warning: a missing file means "no progress yet".

use std::sync::Arc;

use log::warn;

use crate::artifact::{ArtifactLayout, ArtifactStore, ChecklistCounts};

/// Answers "where is this task?" from artifact presence and content
#[derive(Clone)]
pub struct CompletionOracle {
    store: Arc<dyn ArtifactStore>,
    layout: ArtifactLayout,
}

impl CompletionOracle {
    /// Create an oracle over the given store and layout
    pub fn new(store: Arc<dyn ArtifactStore>, layout: ArtifactLayout) -> Self {
        Self { store, layout }
    }

    /// The artifact layout this oracle reads
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Current checklist text, empty when absent or unreadable
    pub fn checklist(&self, task_id: &str) -> String {
        self.read_or_empty(task_id, self.layout.checklist)
    }

    /// Pending/completed counts of the checklist
    pub fn counts(&self, task_id: &str) -> ChecklistCounts {
        ChecklistCounts::of(&self.checklist(task_id))
    }

    /// Number of `- [ ]` items in the checklist
    pub fn count_pending(&self, task_id: &str) -> usize {
        self.counts(task_id).pending
    }

    /// Number of `- [x]` items in the checklist
    pub fn count_completed(&self, task_id: &str) -> usize {
        self.counts(task_id).completed
    }

    /// The worker has written its checkpoint, so the next step is verification
    pub fn is_in_verify_phase(&self, task_id: &str) -> bool {
        self.store.exists(task_id, self.layout.checkpoint)
    }

    /// Verification wrote a pass verdict
    pub fn is_verified(&self, task_id: &str) -> bool {
        self.store.exists(task_id, self.layout.pass)
    }

    /// Verification wrote a fail verdict
    pub fn is_rejected(&self, task_id: &str) -> bool {
        self.store.exists(task_id, self.layout.fail)
    }

    /// Findings written with a fail verdict, if any
    pub fn findings(&self, task_id: &str) -> Option<String> {
        let content = self.read_or_empty(task_id, self.layout.fail);
        if content.trim().is_empty() { None } else { Some(content) }
    }

    fn read_or_empty(&self, task_id: &str, name: &str) -> String {
        match self.store.read(task_id, name) {
            Ok(Some(content)) => content,
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Could not read {} for task {}: {}", name, task_id, e);
                String::new()
            }
        }
    }
}
