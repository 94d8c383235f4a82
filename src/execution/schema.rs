//! JSON Schema validation of execution records

use jsonschema::Validator;
use serde_json::Value;

use super::repair::{repair, sanitize};
use crate::error::{Result, TaskloopError};

/// Embedded copy of the execution record schema
pub const EXECUTION_SCHEMA: &str = include_str!("../../schemas/execution.schema.json");

/// How much normalization to apply before validating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    pub repair: bool,
    pub sanitize: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            repair: true,
            sanitize: true,
        }
    }
}

impl ValidateOptions {
    /// Validate the document exactly as written
    pub fn raw() -> Self {
        Self {
            repair: false,
            sanitize: false,
        }
    }
}

/// Result of validating one document
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    /// Schema violations of the validated document
    pub errors: Vec<String>,
    /// Changes made by repair, if repair ran
    pub warnings: Vec<String>,
    /// The document that was validated, after sanitize and repair
    pub document: Value,
}

/// Compiled execution record schema
pub struct SchemaValidator {
    compiled: Validator,
}

impl SchemaValidator {
    /// Compile the embedded schema
    pub fn new() -> Result<Self> {
        let schema: Value = serde_json::from_str(EXECUTION_SCHEMA)?;
        Self::from_schema(&schema)
    }

    pub fn from_schema(schema: &Value) -> Result<Self> {
        let compiled = jsonschema::validator_for(schema)
            .map_err(|e| TaskloopError::InvalidState(format!("invalid execution schema: {}", e)))?;
        Ok(Self { compiled })
    }

    /// Schema violations of `instance`, one message per error
    pub fn errors(&self, instance: &Value) -> Vec<String> {
        self.compiled
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect()
    }

    /// Sanitize and repair (as requested), then validate
    pub fn validate(&self, value: &Value, options: ValidateOptions) -> ValidationReport {
        let mut document = if options.sanitize { sanitize(value) } else { value.clone() };
        let mut warnings = Vec::new();

        if options.repair {
            let repaired = repair(&document);
            warnings = repaired.warnings.iter().map(|w| w.to_string()).collect();
            match repaired.to_value() {
                Ok(fixed) => document = fixed,
                Err(e) => log::warn!("Failed to serialize repaired record: {}", e),
            }
        }

        let errors = self.errors(&document);
        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
            document,
        }
    }
}
