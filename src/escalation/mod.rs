//! Escalation Module
//!
//! Decides how the next worker invocation should change after repeated
//! failure: redo the research from scratch, or reclassify the task's scope.

mod research;
mod scope;

pub use research::{DEFAULT_FORCE_RESEARCH_AFTER, archived_research_file, force_research, should_force_research};
pub use scope::{
    HeuristicClassifier, KeywordScores, Scope, ScopeCascade, ScopeClassifier, WorkerClassifier, parse_answer,
    read_annotation, resolve_scope, write_annotation,
};

use std::sync::Arc;

use crate::artifact::ArtifactStore;
use crate::error::Result;
use crate::runner::TaskInfo;

/// Escalation decisions for one task store
pub struct EscalationPolicy {
    store: Arc<dyn ArtifactStore>,
    force_research_after: u32,
}

impl EscalationPolicy {
    pub fn new(store: Arc<dyn ArtifactStore>, force_research_after: u32) -> Self {
        Self {
            store,
            force_research_after,
        }
    }

    pub fn force_research_after(&self) -> u32 {
        self.force_research_after
    }

    pub fn should_force_research(&self, info: &TaskInfo) -> bool {
        should_force_research(info, self.force_research_after)
    }

    /// Apply the force-research rule; returns whether research is being forced
    pub fn escalate(&self, task_id: &str, info: &mut TaskInfo) -> Result<bool> {
        if !self.should_force_research(info) {
            return Ok(false);
        }
        force_research(self.store.as_ref(), task_id)?;
        info.re_researched = true;
        Ok(true)
    }

    pub async fn classify_scope(&self, blueprint: &str, cascade: &ScopeCascade) -> Option<Scope> {
        cascade.classify(blueprint).await
    }

    pub async fn resolve_scope(&self, task_id: &str, cascade: &ScopeCascade) -> Result<Scope> {
        resolve_scope(self.store.as_ref(), task_id, cascade).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{MemoryArtifactStore, RESEARCH_FILE, RESEARCH_OLD_FILE};
    use crate::runner::LastError;
    use chrono::Utc;

    #[test]
    fn test_escalate_after_repeated_failure() {
        let store = Arc::new(MemoryArtifactStore::new());
        store.write("T1", RESEARCH_FILE, "notes").unwrap();
        let policy = EscalationPolicy::new(store.clone(), DEFAULT_FORCE_RESEARCH_AFTER);

        let mut info = TaskInfo {
            attempts: 3,
            last_error: Some(LastError {
                message: "exit 1".to_string(),
                timestamp: Utc::now(),
                attempt: 3,
            }),
            ..Default::default()
        };

        assert!(policy.escalate("T1", &mut info).unwrap());
        assert!(info.re_researched);
        assert!(store.exists("T1", RESEARCH_OLD_FILE));
        assert!(!store.exists("T1", RESEARCH_FILE));
    }

    #[test]
    fn test_no_escalation_when_healthy() {
        let store = Arc::new(MemoryArtifactStore::new());
        store.write("T1", RESEARCH_FILE, "notes").unwrap();
        let policy = EscalationPolicy::new(store.clone(), 3);

        let mut info = TaskInfo {
            attempts: 10,
            ..Default::default()
        };
        assert!(!policy.escalate("T1", &mut info).unwrap());
        assert!(store.exists("T1", RESEARCH_FILE));
    }

    #[tokio::test]
    async fn test_classify_scope_through_policy() {
        let store = Arc::new(MemoryArtifactStore::new());
        let policy = EscalationPolicy::new(store, 3);
        let cascade = ScopeCascade::new().with(HeuristicClassifier);
        let scope = policy
            .classify_scope("Style the page layout with CSS and a button", &cascade)
            .await;
        assert_eq!(scope, Some(Scope::Frontend));
    }
}
