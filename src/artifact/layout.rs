//! Artifact filenames that make up the worker protocol.
//!
//! The presence or absence of these files is the only channel the worker
//! has to report progress, so the exact names are part of the protocol.

use serde::{Deserialize, Serialize};

/// Structured execution record produced by the worker
pub const EXECUTION_FILE: &str = "execution.json";

/// Durable per-task run bookkeeping
pub const INFO_FILE: &str = "info.json";

/// Task plan, carries the `@scope` annotation
pub const BLUEPRINT_FILE: &str = "BLUEPRINT.md";

/// Research notes the worker writes before executing
pub const RESEARCH_FILE: &str = "RESEARCH.md";

/// Where research is moved when escalation forces a fresh pass
pub const RESEARCH_OLD_FILE: &str = "RESEARCH.old.md";

/// Which family of artifact names a loop uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    /// TODO.md / OVERVIEW.md with a critical-review verdict
    #[default]
    Standard,
    /// Everything prefixed with CRITICAL_REVIEW_
    CriticalReview,
    /// TODO.md / OVERVIEW.md with a prompt-refinement verdict
    PromptRefinement,
}

impl std::fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayoutKind::Standard => "standard",
            LayoutKind::CriticalReview => "critical-review",
            LayoutKind::PromptRefinement => "prompt-refinement",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for LayoutKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(LayoutKind::Standard),
            "critical-review" | "critical_review" => Ok(LayoutKind::CriticalReview),
            "prompt-refinement" | "prompt_refinement" => Ok(LayoutKind::PromptRefinement),
            other => Err(format!("unknown layout '{}'", other)),
        }
    }
}

/// Names of the signal files a loop reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// ChecklistDoc: pending/completed items
    pub checklist: &'static str,
    /// CheckpointDoc: "execute phase believes it is done"
    pub checkpoint: &'static str,
    /// PassDoc: verify phase verdict, pass
    pub pass: &'static str,
    /// FailDoc: verify phase verdict, fail
    pub fail: &'static str,
}

impl ArtifactLayout {
    /// TODO.md / OVERVIEW.md / CRITICAL_REVIEW_PASSED.md
    pub const fn standard() -> Self {
        Self {
            checklist: "TODO.md",
            checkpoint: "OVERVIEW.md",
            pass: "CRITICAL_REVIEW_PASSED.md",
            fail: "CRITICAL_REVIEW_FAILED.md",
        }
    }

    /// CRITICAL_REVIEW_TODO.md / CRITICAL_REVIEW_OVERVIEW.md / CRITICAL_REVIEW_PASSED.md
    pub const fn critical_review() -> Self {
        Self {
            checklist: "CRITICAL_REVIEW_TODO.md",
            checkpoint: "CRITICAL_REVIEW_OVERVIEW.md",
            pass: "CRITICAL_REVIEW_PASSED.md",
            fail: "CRITICAL_REVIEW_FAILED.md",
        }
    }

    /// TODO.md / OVERVIEW.md / PROMPT_REFINEMENT_PASSED.md
    pub const fn prompt_refinement() -> Self {
        Self {
            checklist: "TODO.md",
            checkpoint: "OVERVIEW.md",
            pass: "PROMPT_REFINEMENT_PASSED.md",
            fail: "CRITICAL_REVIEW_FAILED.md",
        }
    }

    /// Resolve a layout from its kind
    pub const fn for_kind(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::Standard => Self::standard(),
            LayoutKind::CriticalReview => Self::critical_review(),
            LayoutKind::PromptRefinement => Self::prompt_refinement(),
        }
    }

    /// Verdict files left behind by a previous verification attempt
    pub fn verdicts(&self) -> [&'static str; 2] {
        [self.pass, self.fail]
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::standard()
    }
}
