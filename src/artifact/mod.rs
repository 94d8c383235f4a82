//! Artifact Module
//!
//! Task artifacts are the message bus between the loop and the worker:
//! the worker reports progress only by writing these files.

mod checklist;
mod layout;
mod store;

pub use checklist::{
    ChecklistCounts, count_completed, count_pending, implementation_marker, pending_lines, set_implementation_marker,
};
pub use layout::{
    ArtifactLayout, BLUEPRINT_FILE, EXECUTION_FILE, INFO_FILE, LayoutKind, RESEARCH_FILE, RESEARCH_OLD_FILE,
};
pub use store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
