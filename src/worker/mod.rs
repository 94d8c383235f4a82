//! Worker boundary - the external coding agent
//!
//! This module provides:
//! - Worker trait for agent abstraction
//! - CliWorker subprocess implementation
//! - MockWorker for scripted tests

pub mod cli;
pub mod mock;
pub mod traits;

pub use cli::{CliWorker, CliWorkerConfig};
pub use mock::MockWorker;
pub use traits::{InvocationMode, Worker, WorkerError, WorkerOutput, WorkerRequest};
