//! Subprocess worker - runs an agent CLI with the prompt on stdin.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::traits::{InvocationMode, Worker, WorkerError, WorkerOutput, WorkerRequest};

/// Configuration for the agent subprocess
#[derive(Debug, Clone)]
pub struct CliWorkerConfig {
    /// Executable to run
    pub command: String,
    /// Arguments for standard runs
    pub args: Vec<String>,
    /// Arguments for fast runs
    pub fast_args: Vec<String>,
    /// Optional hard limit per invocation
    pub timeout: Option<Duration>,
}

impl Default for CliWorkerConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec!["--dangerously-skip-permissions".to_string(), "-p".to_string()],
            fast_args: vec!["-p".to_string()],
            timeout: None,
        }
    }
}

/// Worker that shells out to an agent CLI
pub struct CliWorker {
    config: CliWorkerConfig,
}

impl CliWorker {
    /// Create a new CLI worker
    pub fn new(config: CliWorkerConfig) -> Self {
        Self { config }
    }

    /// The executable this worker runs
    pub fn command(&self) -> &str {
        &self.config.command
    }

    fn args_for(&self, mode: InvocationMode) -> &[String] {
        match mode {
            InvocationMode::Standard => &self.config.args,
            InvocationMode::Fast => &self.config.fast_args,
        }
    }

    async fn execute(&self, request: &WorkerRequest) -> Result<std::process::Output, WorkerError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(self.args_for(request.mode))
            .current_dir(&request.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| WorkerError::Spawn(format!("{}: {}", self.config.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The process may exit without reading its input; its exit status decides the outcome.
            if let Err(e) = stdin.write_all(request.prompt.as_bytes()).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(e.into());
            }
            drop(stdin);
        }

        match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(WorkerError::Timeout(limit)),
            },
            None => Ok(child.wait_with_output().await?),
        }
    }
}

#[async_trait]
impl Worker for CliWorker {
    async fn invoke(&self, request: WorkerRequest) -> Result<WorkerOutput, WorkerError> {
        debug!(
            "Invoking {} for task {} ({:?} mode, {} prompt bytes)",
            self.config.command,
            request.task_id,
            request.mode,
            request.prompt.len()
        );

        let output = self.execute(&request).await?;
        if output.status.success() {
            Ok(WorkerOutput::text(String::from_utf8_lossy(&output.stdout)))
        } else {
            Err(WorkerError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
