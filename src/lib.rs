//! Taskloop - a self-correcting execution loop around an AI coding agent
//!
//! A task runs as an execute/verify loop. The worker reports progress only by
//! writing files into the task directory; the loop reads those files to decide
//! whether to keep executing, review, escalate, or stop.

pub mod artifact;
pub mod error;
pub mod escalation;
pub mod execution;
pub mod insights;
pub mod oracle;
pub mod prompt;
pub mod runner;
pub mod worker;
pub mod workspace;

pub use error::{Result, TaskloopError};
