//! Execution Module - Repair and validation of `execution.json`
//!
//! The worker writes a structured plan-and-progress record each iteration.
//! It is often partial or inconsistent, so the loop normalizes it into a
//! schema-valid form without ever inventing success.

mod coerce;
mod record;
mod repair;
mod schema;

pub use coerce::RepairWarning;
pub use record::{
    ArtifactAction, Completion, CompletionStatus, Confidence, CurrentPhase, ErrorEntry, ExecutionRecord,
    FileArtifact, Item, NOOP_COMMAND, Phase, PreCondition, RecordStatus, SuccessCriterion, TestType, Uncertainty,
};
pub use repair::{RepairedRecord, parse_lenient, repair, sanitize};
pub use schema::{EXECUTION_SCHEMA, SchemaValidator, ValidateOptions, ValidationReport};

use log::{debug, warn};
use serde_json::Value;

use crate::artifact::{ArtifactStore, EXECUTION_FILE};
use crate::error::Result;

/// Outcome of checking a task's stored execution record
#[derive(Debug, Clone)]
pub struct RecordMaintenance {
    /// False when the file held no recoverable JSON
    pub parsed: bool,
    /// Whether the repaired record was written back
    pub written: bool,
    pub report: ValidationReport,
}

/// Repairs and validates execution records against the embedded schema
pub struct StateRepairValidator {
    schema: SchemaValidator,
}

impl StateRepairValidator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            schema: SchemaValidator::new()?,
        })
    }

    pub fn repair(&self, raw: &Value) -> RepairedRecord {
        repair(raw)
    }

    pub fn validate(&self, value: &Value, options: ValidateOptions) -> ValidationReport {
        self.schema.validate(value, options)
    }

    /// Repaired view of the task's record, if it has one
    pub fn load(&self, store: &dyn ArtifactStore, task_id: &str) -> Result<Option<ExecutionRecord>> {
        let Some(text) = store.read(task_id, EXECUTION_FILE)? else {
            return Ok(None);
        };
        let raw = parse_lenient(&text).unwrap_or(Value::Null);
        Ok(Some(repair(&sanitize(&raw)).record))
    }

    /// Repair the task's `execution.json` in place.
    ///
    /// Unparseable files are reported but left untouched so the worker's text
    /// is not lost. With `dry_run` nothing is written.
    pub fn maintain(&self, store: &dyn ArtifactStore, task_id: &str, dry_run: bool) -> Result<Option<RecordMaintenance>> {
        let Some(text) = store.read(task_id, EXECUTION_FILE)? else {
            debug!("No {} for task {}", EXECUTION_FILE, task_id);
            return Ok(None);
        };

        let Some(raw) = parse_lenient(&text) else {
            warn!("{} for task {} is not JSON, leaving it untouched", EXECUTION_FILE, task_id);
            return Ok(Some(RecordMaintenance {
                parsed: false,
                written: false,
                report: self.validate(&Value::Null, ValidateOptions::default()),
            }));
        };

        let report = self.validate(&raw, ValidateOptions::default());
        let changed = report.document != raw;
        let written = changed && !dry_run;
        if written {
            let mut out = serde_json::to_string_pretty(&report.document)?;
            out.push('\n');
            store.write(task_id, EXECUTION_FILE, &out)?;
            warn!(
                "Repaired {} for task {} ({} changes)",
                EXECUTION_FILE,
                task_id,
                report.warnings.len()
            );
        }

        Ok(Some(RecordMaintenance {
            parsed: true,
            written,
            report,
        }))
    }
}
