//! Core worker types and trait definitions

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// The external coding agent, invoked once per loop iteration.
///
/// The worker has no structured return channel for loop progress: it reports
/// through files it writes. Only success/failure and raw stdout come back.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Run the worker to completion on a rendered prompt
    async fn invoke(&self, request: WorkerRequest) -> Result<WorkerOutput, WorkerError>;
}

/// How expensive an invocation is allowed to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvocationMode {
    /// Full agent run with tools and file access
    #[default]
    Standard,
    /// Cheap single-answer run (classification, short questions)
    Fast,
}

/// Everything needed for one worker call
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    /// Fully rendered prompt
    pub prompt: String,

    /// Standard or fast mode
    pub mode: InvocationMode,

    /// Task the call belongs to (for logging)
    pub task_id: String,

    /// Directory the worker runs in
    pub working_dir: PathBuf,
}

impl WorkerRequest {
    /// Standard-mode request
    pub fn new(task_id: impl Into<String>, prompt: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            mode: InvocationMode::Standard,
            task_id: task_id.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Switch the request to fast mode
    pub fn fast(mut self) -> Self {
        self.mode = InvocationMode::Fast;
        self
    }
}

/// What comes back from a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutput {
    /// Captured standard output
    pub stdout: String,
}

impl WorkerOutput {
    /// Output carrying the given stdout text
    pub fn text(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into() }
    }
}

/// Failures of the worker boundary
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("Worker exited with status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("Worker timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_standard_mode() {
        let request = WorkerRequest::new("T1", "do it", "/repo");
        assert_eq!(request.mode, InvocationMode::Standard);
        assert_eq!(request.fast().mode, InvocationMode::Fast);
    }

    #[test]
    fn test_exit_status_message() {
        let err = WorkerError::ExitStatus {
            code: Some(2),
            stderr: "auth failed".to_string(),
        };
        assert_eq!(err.to_string(), "Worker exited with status Some(2): auth failed");
    }
}
