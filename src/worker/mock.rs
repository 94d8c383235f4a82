//! Scripted in-process worker for tests.
//!
//! Each step is a closure run on one invocation. Steps typically write
//! artifact files to simulate what a real agent would leave behind.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::{Worker, WorkerError, WorkerOutput, WorkerRequest};

type Step = Box<dyn Fn(&WorkerRequest) -> Result<WorkerOutput, WorkerError> + Send + Sync>;

/// Worker that replays a script of steps and records every request
#[derive(Default)]
pub struct MockWorker {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<WorkerRequest>>,
}

impl MockWorker {
    /// Worker with no steps: every call succeeds with empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the script
    pub fn then<F>(self, step: F) -> Self
    where
        F: Fn(&WorkerRequest) -> Result<WorkerOutput, WorkerError> + Send + Sync + 'static,
    {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(Box::new(step));
        }
        self
    }

    /// Append a step that answers with fixed stdout
    pub fn then_reply(self, stdout: &str) -> Self {
        let stdout = stdout.to_string();
        self.then(move |_| Ok(WorkerOutput::text(stdout.clone())))
    }

    /// Append a step that fails with a non-zero exit
    pub fn then_fail(self, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.then(move |_| {
            Err(WorkerError::ExitStatus {
                code: Some(1),
                stderr: stderr.clone(),
            })
        })
    }

    /// Number of invocations so far
    pub fn invocations(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Prompts received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.iter().map(|req| req.prompt.clone()).collect())
            .unwrap_or_default()
    }

    /// Requests received, in order
    pub fn requests(&self) -> Vec<WorkerRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Worker for MockWorker {
    async fn invoke(&self, request: WorkerRequest) -> Result<WorkerOutput, WorkerError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let step = self.steps.lock().ok().and_then(|mut steps| steps.pop_front());
        match step {
            Some(step) => step(&request),
            None => Ok(WorkerOutput::default()),
        }
    }
}
