//! Loop runner module - the self-correcting execute/verify loop.
//!
//! This module provides:
//! - LoopController, which drives one task to a verified result
//! - LoopSession and IterationBudget for per-run state
//! - TaskInfo, the attempt history persisted in `info.json`

mod loop_runner;
mod session;
mod task_info;

pub use loop_runner::{AUTO_GENERATED_MARKER, ControllerOptions, LoopController, RunConfig, RunSummary};
pub use session::{DEFAULT_MAX_ITERATIONS, IterationBudget, LoopSession, Phase};
pub use task_info::{ErrorRecord, HistoryEntry, LastError, MAX_STACK_CHARS, TaskInfo};
