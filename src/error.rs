//! Error types for Taskloop
//!
//! Centralized error handling using thiserror. Only fatal conditions live here;
//! malformed artifacts degrade to default readings and are logged instead.

use thiserror::Error;

/// All fatal error types that can occur in Taskloop
#[derive(Debug, Error)]
pub enum TaskloopError {
    /// The external worker call failed (spawn error, non-zero exit)
    #[error("Worker invocation failed on attempt {attempt}: {message}")]
    WorkerInvocation { attempt: u32, message: String },

    /// A required prompt template is missing
    #[error("Missing prompt template: {0}")]
    MissingTemplate(String),

    /// The loop ran out of iterations without a verified pass
    #[error("Loop did not converge after {iterations} iterations. Remaining checklist:\n{remaining}")]
    IterationBudgetExhausted { iterations: u32, remaining: String },

    /// Multi-repo mode could not resolve a task scope
    #[error("Scope validation failed: {0}")]
    ScopeValidation(String),

    /// Invalid state transition or input
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Taskloop operations
pub type Result<T> = std::result::Result<T, TaskloopError>;
