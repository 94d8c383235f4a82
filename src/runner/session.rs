//! In-memory state of one `run()` call

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::escalation::Scope;

/// Which half of the loop the next invocation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Execute,
    Verify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Execute => write!(f, "execute"),
            Phase::Verify => write!(f, "verify"),
        }
    }
}

/// Cap on worker invocations per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationBudget {
    Limited(u32),
    Unbounded,
}

impl Default for IterationBudget {
    fn default() -> Self {
        IterationBudget::Limited(DEFAULT_MAX_ITERATIONS)
    }
}

/// Iterations allowed when nothing else is configured
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

impl IterationBudget {
    /// Budget from CLI/config values; `unbounded` wins over a number
    pub fn from_options(max_iterations: Option<u32>, unbounded: bool) -> Self {
        if unbounded {
            IterationBudget::Unbounded
        } else {
            IterationBudget::Limited(max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS))
        }
    }

    /// Whether iteration `n` (1-based) may invoke the worker
    pub fn allows(&self, n: u32) -> bool {
        match self {
            IterationBudget::Limited(max) => n <= *max,
            IterationBudget::Unbounded => true,
        }
    }
}

impl fmt::Display for IterationBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationBudget::Limited(max) => write!(f, "{}", max),
            IterationBudget::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// State carried between iterations of one run.
///
/// Phase is re-derived from artifacts each iteration; this only caches it for
/// prompt rendering and logs.
#[derive(Debug, Clone)]
pub struct LoopSession {
    pub task_id: String,
    pub phase: Phase,
    pub iteration: u32,
    pub budget: IterationBudget,
    /// Review findings carried into the next Execute prompt
    pub previous_findings: Option<String>,
    pub force_research: bool,
    pub scope: Option<Scope>,
}

impl LoopSession {
    pub fn new(task_id: impl Into<String>, budget: IterationBudget) -> Self {
        Self {
            task_id: task_id.into(),
            phase: Phase::Execute,
            iteration: 1,
            budget,
            previous_findings: None,
            force_research: false,
            scope: None,
        }
    }

    /// Whether the current iteration is within budget
    pub fn has_budget(&self) -> bool {
        self.budget.allows(self.iteration)
    }

    /// Invocations completed so far
    pub fn iterations_used(&self) -> u32 {
        self.iteration - 1
    }

    pub fn advance(&mut self) {
        self.iteration = self.iteration.saturating_add(1);
    }
}
