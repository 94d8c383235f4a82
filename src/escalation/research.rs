//! Forced re-research after repeated failure

use log::info;

use crate::artifact::{ArtifactStore, RESEARCH_FILE, RESEARCH_OLD_FILE};
use crate::error::Result;
use crate::runner::TaskInfo;

/// Failed attempts before research is redone from scratch
pub const DEFAULT_FORCE_RESEARCH_AFTER: u32 = 3;

/// Whether the next invocation must redo its research
pub fn should_force_research(info: &TaskInfo, threshold: u32) -> bool {
    info.attempts >= threshold && info.last_error.is_some()
}

/// Move the current research notes aside so the worker has to regenerate them.
///
/// The notes are renamed, never deleted: an earlier `RESEARCH.old.md` is first
/// moved to the next free `RESEARCH.old.<n>.md`. Returns whether there was
/// anything to move.
pub fn force_research(store: &dyn ArtifactStore, task_id: &str) -> Result<bool> {
    if !store.exists(task_id, RESEARCH_FILE) {
        return Ok(false);
    }
    archive_previous(store, task_id)?;
    let moved = store.rename(task_id, RESEARCH_FILE, RESEARCH_OLD_FILE)?;
    if moved {
        info!("Moved {} to {} for task {}", RESEARCH_FILE, RESEARCH_OLD_FILE, task_id);
    }
    Ok(moved)
}

/// Name of the `n`th archived research file (`RESEARCH.old.<n>.md`)
pub fn archived_research_file(n: u32) -> String {
    format!("{}.{}.md", RESEARCH_OLD_FILE.trim_end_matches(".md"), n)
}

fn archive_previous(store: &dyn ArtifactStore, task_id: &str) -> Result<()> {
    if !store.exists(task_id, RESEARCH_OLD_FILE) {
        return Ok(());
    }
    let mut n = 1;
    while store.exists(task_id, &archived_research_file(n)) {
        n += 1;
    }
    let target = archived_research_file(n);
    store.rename(task_id, RESEARCH_OLD_FILE, &target)?;
    info!("Archived {} as {} for task {}", RESEARCH_OLD_FILE, target, task_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactStore;
    use crate::runner::LastError;
    use chrono::Utc;

    fn failing_info(attempts: u32) -> TaskInfo {
        TaskInfo {
            attempts,
            last_error: Some(LastError {
                message: "exit 1".to_string(),
                timestamp: Utc::now(),
                attempt: attempts,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_and_error_both_required() {
        assert!(should_force_research(&failing_info(3), 3));
        assert!(should_force_research(&failing_info(5), 3));
        assert!(!should_force_research(&failing_info(2), 3));

        let recovered = TaskInfo {
            attempts: 7,
            ..Default::default()
        };
        assert!(!should_force_research(&recovered, 3));
    }

    #[test]
    fn test_force_research_renames() {
        let store = MemoryArtifactStore::new();
        store.write("T1", RESEARCH_FILE, "old notes").unwrap();

        assert!(force_research(&store, "T1").unwrap());
        assert!(!store.exists("T1", RESEARCH_FILE));
        assert_eq!(store.read("T1", RESEARCH_OLD_FILE).unwrap().as_deref(), Some("old notes"));
    }

    #[test]
    fn test_force_research_without_notes() {
        let store = MemoryArtifactStore::new();
        assert!(!force_research(&store, "T1").unwrap());
    }

    #[test]
    fn test_repeated_escalation_keeps_every_research() {
        let store = MemoryArtifactStore::new();

        store.write("T1", RESEARCH_FILE, "first research").unwrap();
        assert!(force_research(&store, "T1").unwrap());
        store.write("T1", RESEARCH_FILE, "second research").unwrap();
        assert!(force_research(&store, "T1").unwrap());
        store.write("T1", RESEARCH_FILE, "third research").unwrap();
        assert!(force_research(&store, "T1").unwrap());

        assert_eq!(archived_research_file(1), "RESEARCH.old.1.md");
        let read = |name: &str| store.read("T1", name).unwrap();
        assert_eq!(read(&archived_research_file(1)).as_deref(), Some("first research"));
        assert_eq!(read(&archived_research_file(2)).as_deref(), Some("second research"));
        assert_eq!(read(RESEARCH_OLD_FILE).as_deref(), Some("third research"));
        assert!(!store.exists("T1", RESEARCH_FILE));
    }

    #[test]
    fn test_no_notes_leaves_archive_alone() {
        let store = MemoryArtifactStore::new();
        store.write("T1", RESEARCH_OLD_FILE, "earlier").unwrap();
        assert!(!force_research(&store, "T1").unwrap());
        assert_eq!(store.read("T1", RESEARCH_OLD_FILE).unwrap().as_deref(), Some("earlier"));
        assert!(!store.exists("T1", &archived_research_file(1)));
    }
}
