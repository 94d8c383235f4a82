//! Typed execution record and its entities.
//!
//! `execution.json` is written by the worker and is frequently incomplete or
//! inconsistent. Each entity here has a `from_untyped` constructor that builds
//! a schema-valid value from arbitrary JSON, keeping unknown keys in `extra`
//! and recording a warning for every change it makes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::coerce::{self, Repairs, child, first_of, index};

/// Harmless command used when a pre-condition has none
pub const NOOP_COMMAND: &str = "true";

/// Record format version written when the worker omitted one
pub const DEFAULT_VERSION: &str = "1.0";

macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident, serde = $case:literal,
        { $($variant:ident => [$($alias:literal),+]),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = $case)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl $name {
            /// Parse a raw token, accepting case and separator variations
            pub fn parse(raw: &str) -> Option<Self> {
                let key = coerce::enum_key(raw);
                $(
                    if [$($alias),+].contains(&key.as_str()) {
                        return Some($name::$variant);
                    }
                )+
                None
            }

            fn coerce(value: Option<&Value>, path: &str, repairs: &mut Repairs) -> Self {
                match value {
                    Some(Value::String(raw)) => match Self::parse(raw) {
                        Some(parsed) => {
                            if serde_json::to_value(parsed).ok().as_ref() != value {
                                repairs.warn(path, format!("normalized {:?} to {:?}", raw, parsed));
                            }
                            parsed
                        }
                        None => {
                            repairs.warn(path, format!("unknown value {:?}, defaulted to {:?}", raw, $name::$default));
                            $name::$default
                        }
                    },
                    None | Some(Value::Null) => {
                        repairs.warn(path, format!("missing, defaulted to {:?}", $name::$default));
                        $name::$default
                    }
                    Some(other) => {
                        repairs.warn(path, format!("unexpected {}, defaulted to {:?}", coerce::type_name(other), $name::$default));
                        $name::$default
                    }
                }
            }
        }
    };
}

token_enum!(
    /// Lifecycle status of the record and of each phase
    RecordStatus, default = Pending, serde = "snake_case",
    {
        Pending => ["pending", "todo", "not_started"],
        InProgress => ["in_progress", "inprogress", "running", "active", "started"],
        Completed => ["completed", "complete", "done"],
        Blocked => ["blocked", "stuck"],
    }
);

token_enum!(
    /// Final state declared in the `completion` block
    CompletionStatus, default = PendingValidation, serde = "snake_case",
    {
        PendingValidation => ["pending_validation", "pending", "awaiting_validation"],
        Completed => ["completed", "complete", "done"],
        Blocked => ["blocked"],
        Failed => ["failed", "failure", "error"],
    }
);

token_enum!(
    /// Worker's confidence in an assumption
    Confidence, default = Low, serde = "UPPERCASE",
    {
        Low => ["low"],
        Medium => ["medium", "med"],
        High => ["high"],
    }
);

token_enum!(
    /// How a success criterion is checked
    TestType, default = Manual, serde = "UPPERCASE",
    {
        Auto => ["auto", "automated", "automatic"],
        Manual => ["manual"],
        Both => ["both"],
    }
);

token_enum!(
    /// What happened to a file the worker touched
    ArtifactAction, default = Modified, serde = "lowercase",
    {
        Created => ["created", "create", "new", "added", "add"],
        Modified => ["modified", "modify", "updated", "update", "edited", "edit", "changed"],
        Deleted => ["deleted", "delete", "removed", "remove"],
    }
);

impl Confidence {
    /// Confidence from a free-form value; numbers map onto LOW/MEDIUM/HIGH bands
    fn coerce_any(value: Option<&Value>, path: &str, repairs: &mut Repairs) -> Self {
        match value.and_then(Value::as_f64) {
            Some(score) => {
                let level = if score >= 0.8 {
                    Confidence::High
                } else if score >= 0.5 {
                    Confidence::Medium
                } else {
                    Confidence::Low
                };
                repairs.warn(path, format!("mapped score {} to {:?}", score, level));
                level
            }
            None => Confidence::coerce(value, path, repairs),
        }
    }
}

fn object_or_empty(value: &Value, path: &str, repairs: &mut Repairs) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        other => {
            repairs.warn(path, format!("expected object, got {}", coerce::type_name(other)));
            Map::new()
        }
    }
}

/// A checklist item inside a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub description: String,
    pub completed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    const FIELDS: &'static [&'static str] = &["description", "completed"];

    pub fn from_untyped(value: &Value, path: &str, repairs: &mut Repairs) -> Self {
        if let Value::String(description) = value {
            repairs.warn(path, "expanded string into item");
            return Self {
                description: description.clone(),
                completed: false,
                extra: Map::new(),
            };
        }
        let object = object_or_empty(value, path, repairs);
        let description = first_of(&object, &["description", "task", "title", "text", "name"]);
        Self {
            description: coerce::text_or(description, "", &child(path, "description"), repairs),
            completed: coerce::strict_bool(object.get("completed"), &child(path, "completed"), repairs)
                .unwrap_or_else(|| {
                    repairs.warn(child(path, "completed"), "defaulted to false");
                    false
                }),
            extra: coerce::extras(&object, Self::FIELDS),
        }
    }
}

/// A check that must hold before a phase starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreCondition {
    pub check: String,
    pub command: String,
    pub expected: String,
    pub passed: bool,
    pub evidence: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PreCondition {
    const FIELDS: &'static [&'static str] = &["check", "command", "expected", "passed", "evidence"];

    pub fn from_untyped(value: &Value, path: &str, repairs: &mut Repairs) -> Self {
        if let Value::String(check) = value {
            repairs.warn(path, "expanded string into pre-condition");
            return Self {
                check: check.clone(),
                command: NOOP_COMMAND.to_string(),
                expected: String::new(),
                passed: false,
                evidence: String::new(),
                extra: Map::new(),
            };
        }
        let object = object_or_empty(value, path, repairs);
        let command = match coerce::text(object.get("command"), &child(path, "command"), repairs) {
            Some(command) if !command.trim().is_empty() => command,
            _ => {
                repairs.warn(child(path, "command"), "missing, replaced with no-op");
                NOOP_COMMAND.to_string()
            }
        };
        Self {
            check: coerce::text_or(first_of(&object, &["check", "description"]), "", &child(path, "check"), repairs),
            command,
            expected: coerce::text_or(object.get("expected"), "", &child(path, "expected"), repairs),
            passed: coerce::strict_bool(object.get("passed"), &child(path, "passed"), repairs).unwrap_or(false),
            evidence: coerce::text_or(object.get("evidence"), "", &child(path, "evidence"), repairs),
            extra: coerce::extras(&object, Self::FIELDS),
        }
    }
}

/// One phase of the worker's plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: u32,
    pub name: String,
    pub status: RecordStatus,
    pub pre_conditions: Vec<PreCondition>,
    pub items: Vec<Item>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Phase {
    const FIELDS: &'static [&'static str] = &["id", "name", "status", "preConditions", "items"];

    pub fn from_untyped(value: &Value, position: usize, path: &str, repairs: &mut Repairs) -> Self {
        let object = object_or_empty(value, path, repairs);
        let id = match coerce::count(object.get("id"), &child(path, "id"), repairs) {
            Some(id) if id > 0 => id,
            _ => {
                let fallback = position as u32 + 1;
                repairs.warn(child(path, "id"), format!("defaulted to {}", fallback));
                fallback
            }
        };
        let name = coerce::text(object.get("name"), &child(path, "name"), repairs).unwrap_or_else(|| {
            repairs.warn(child(path, "name"), "missing, derived from id");
            format!("Phase {}", id)
        });

        let conditions_path = child(path, "preConditions");
        let pre_conditions = coerce::list(object.get("preConditions"), &conditions_path, repairs)
            .iter()
            .enumerate()
            .map(|(i, raw)| PreCondition::from_untyped(raw, &index(&conditions_path, i), repairs))
            .collect();

        let items_path = child(path, "items");
        let items = coerce::list(object.get("items"), &items_path, repairs)
            .iter()
            .enumerate()
            .map(|(i, raw)| Item::from_untyped(raw, &index(&items_path, i), repairs))
            .collect();

        Self {
            id,
            name,
            status: RecordStatus::coerce(object.get("status"), &child(path, "status"), repairs),
            pre_conditions,
            items,
            extra: coerce::extras(&object, Self::FIELDS),
        }
    }
}

/// Pointer to the phase the worker is on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPhase {
    pub id: u32,
    pub name: String,
    pub last_action: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CurrentPhase {
    const FIELDS: &'static [&'static str] = &["id", "name", "lastAction"];

    /// First unfinished phase, else the last one, else phase 1
    fn derive(phases: &[Phase]) -> Self {
        let phase = phases
            .iter()
            .find(|p| p.status != RecordStatus::Completed)
            .or_else(|| phases.last());
        Self {
            id: phase.map(|p| p.id).unwrap_or(1),
            name: phase.map(|p| p.name.clone()).unwrap_or_default(),
            last_action: String::new(),
            extra: Map::new(),
        }
    }

    pub fn from_untyped(value: Option<&Value>, phases: &[Phase], path: &str, repairs: &mut Repairs) -> Self {
        match value {
            None | Some(Value::Null) => {
                repairs.warn(path, "missing, derived from phases");
                Self::derive(phases)
            }
            Some(Value::Number(_)) | Some(Value::String(_)) => {
                let mut current = Self::derive(phases);
                if let Some(id) = coerce::count(value, &child(path, "id"), repairs).filter(|id| *id > 0) {
                    current.id = id;
                    current.name = phases
                        .iter()
                        .find(|p| p.id == id)
                        .map(|p| p.name.clone())
                        .unwrap_or_default();
                } else if let Some(Value::String(name)) = value {
                    current.name = name.clone();
                }
                repairs.warn(path, "expanded scalar into current phase");
                current
            }
            Some(other) => {
                let object = object_or_empty(other, path, repairs);
                let id = coerce::count(object.get("id"), &child(path, "id"), repairs)
                    .filter(|id| *id > 0)
                    .unwrap_or_else(|| {
                        repairs.warn(child(path, "id"), "defaulted from phases");
                        Self::derive(phases).id
                    });
                Self {
                    id,
                    name: coerce::text_or(object.get("name"), "", &child(path, "name"), repairs),
                    last_action: coerce::text_or(object.get("lastAction"), "", &child(path, "lastAction"), repairs),
                    extra: coerce::extras(&object, Self::FIELDS),
                }
            }
        }
    }
}

/// An error the worker recorded while executing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: String,
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorEntry {
    const FIELDS: &'static [&'static str] = &["timestamp", "message"];

    pub fn from_untyped(value: &Value, path: &str, repairs: &mut Repairs) -> Self {
        if let Value::String(message) = value {
            repairs.warn(path, "expanded string into error entry");
            return Self {
                timestamp: String::new(),
                message: message.clone(),
                extra: Map::new(),
            };
        }
        let object = object_or_empty(value, path, repairs);
        Self {
            timestamp: coerce::text_or(object.get("timestamp"), "", &child(path, "timestamp"), repairs),
            message: coerce::text_or(first_of(&object, &["message", "error"]), "", &child(path, "message"), repairs),
            extra: coerce::extras(&object, Self::FIELDS),
        }
    }
}

/// An assumption the worker made under uncertainty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uncertainty {
    pub id: String,
    pub topic: String,
    pub assumption: String,
    pub confidence: Confidence,
    pub resolution: Option<String>,
    pub resolved_confidence: Option<Confidence>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Uncertainty {
    const FIELDS: &'static [&'static str] =
        &["id", "topic", "assumption", "confidence", "resolution", "resolvedConfidence"];

    pub fn from_untyped(value: &Value, position: usize, path: &str, repairs: &mut Repairs) -> Self {
        let fallback_id = format!("U{}", position + 1);
        if let Value::String(topic) = value {
            repairs.warn(path, "expanded string into uncertainty");
            return Self {
                id: fallback_id,
                topic: topic.clone(),
                assumption: String::new(),
                confidence: Confidence::Low,
                resolution: None,
                resolved_confidence: None,
                extra: Map::new(),
            };
        }
        let object = object_or_empty(value, path, repairs);
        let resolved_path = child(path, "resolvedConfidence");
        let resolved_confidence = match object.get("resolvedConfidence") {
            None | Some(Value::Null) => None,
            raw @ Some(Value::Number(_)) => Some(Confidence::coerce_any(raw, &resolved_path, repairs)),
            Some(Value::String(raw)) => {
                let parsed = Confidence::parse(raw);
                if parsed.is_none() {
                    repairs.warn(&resolved_path, format!("unknown value {:?}, cleared", raw));
                }
                parsed
            }
            Some(other) => {
                repairs.warn(&resolved_path, format!("unexpected {}, cleared", coerce::type_name(other)));
                None
            }
        };
        Self {
            id: coerce::text(object.get("id"), &child(path, "id"), repairs).unwrap_or_else(|| {
                repairs.warn(child(path, "id"), format!("defaulted to {}", fallback_id));
                fallback_id
            }),
            topic: coerce::text_or(object.get("topic"), "", &child(path, "topic"), repairs),
            assumption: coerce::text_or(object.get("assumption"), "", &child(path, "assumption"), repairs),
            confidence: Confidence::coerce_any(object.get("confidence"), &child(path, "confidence"), repairs),
            resolution: coerce::text(object.get("resolution"), &child(path, "resolution"), repairs),
            resolved_confidence,
            extra: coerce::extras(&object, Self::FIELDS),
        }
    }
}

/// A file the worker created, changed or removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileArtifact {
    #[serde(rename = "type")]
    pub action: ArtifactAction,
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileArtifact {
    const FIELDS: &'static [&'static str] = &["type", "path"];

    pub fn from_untyped(value: &Value, path: &str, repairs: &mut Repairs) -> Self {
        if let Value::String(file) = value {
            repairs.warn(path, "expanded string into artifact");
            return Self {
                action: ArtifactAction::Modified,
                path: file.clone(),
                extra: Map::new(),
            };
        }
        let object = object_or_empty(value, path, repairs);
        Self {
            action: ArtifactAction::coerce(first_of(&object, &["type", "action"]), &child(path, "type"), repairs),
            path: coerce::text_or(first_of(&object, &["path", "file"]), "", &child(path, "path"), repairs),
            extra: coerce::extras(&object, Self::FIELDS),
        }
    }
}

/// How the task's success will be judged.
///
/// `passed: None` is a permanent, valid state for MANUAL criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessCriterion {
    pub criterion: String,
    pub source: String,
    pub test_type: TestType,
    pub command: Option<String>,
    pub manual_check: Option<String>,
    pub passed: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SuccessCriterion {
    const FIELDS: &'static [&'static str] =
        &["criterion", "source", "testType", "command", "manualCheck", "passed"];

    pub fn from_untyped(value: &Value, path: &str, repairs: &mut Repairs) -> Self {
        if let Value::String(criterion) = value {
            repairs.warn(path, "expanded string into manual criterion");
            return Self {
                criterion: criterion.clone(),
                source: String::new(),
                test_type: TestType::Manual,
                command: None,
                manual_check: None,
                passed: None,
                extra: Map::new(),
            };
        }
        let object = object_or_empty(value, path, repairs);
        let command = coerce::text(object.get("command"), &child(path, "command"), repairs)
            .filter(|c| !c.trim().is_empty());
        let type_path = child(path, "testType");
        let test_type = match object.get("testType") {
            None | Some(Value::Null) => {
                let inferred = if command.is_some() { TestType::Auto } else { TestType::Manual };
                repairs.warn(&type_path, format!("missing, inferred {:?}", inferred));
                inferred
            }
            raw => TestType::coerce(raw, &type_path, repairs),
        };
        Self {
            criterion: coerce::text_or(
                first_of(&object, &["criterion", "description"]),
                "",
                &child(path, "criterion"),
                repairs,
            ),
            source: coerce::text_or(object.get("source"), "", &child(path, "source"), repairs),
            test_type,
            command,
            manual_check: coerce::text(object.get("manualCheck"), &child(path, "manualCheck"), repairs),
            passed: coerce::strict_bool(object.get("passed"), &child(path, "passed"), repairs),
            extra: coerce::extras(&object, Self::FIELDS),
        }
    }
}

/// The worker's closing statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub status: CompletionStatus,
    pub summary: Vec<String>,
    pub deviations: Vec<String>,
    pub for_future_tasks: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Completion {
    const FIELDS: &'static [&'static str] = &["status", "summary", "deviations", "forFutureTasks"];

    fn empty(status: CompletionStatus) -> Self {
        Self {
            status,
            summary: Vec::new(),
            deviations: Vec::new(),
            for_future_tasks: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn from_untyped(value: Option<&Value>, path: &str, repairs: &mut Repairs) -> Self {
        match value {
            None | Some(Value::Null) => {
                repairs.warn(path, "missing, defaulted to pending_validation");
                Self::empty(CompletionStatus::PendingValidation)
            }
            Some(Value::String(raw)) => {
                repairs.warn(path, "expanded string into completion block");
                match CompletionStatus::parse(raw) {
                    Some(status) => Self::empty(status),
                    None => {
                        let mut completion = Self::empty(CompletionStatus::PendingValidation);
                        completion.summary.push(raw.clone());
                        completion
                    }
                }
            }
            Some(other) => {
                let object = object_or_empty(other, path, repairs);
                Self {
                    status: CompletionStatus::coerce(object.get("status"), &child(path, "status"), repairs),
                    summary: coerce::text_list(object.get("summary"), &child(path, "summary"), repairs),
                    deviations: coerce::text_list(object.get("deviations"), &child(path, "deviations"), repairs),
                    for_future_tasks: coerce::text_list(
                        object.get("forFutureTasks"),
                        &child(path, "forFutureTasks"),
                        repairs,
                    ),
                    extra: coerce::extras(&object, Self::FIELDS),
                }
            }
        }
    }
}

/// The full structured plan-and-progress document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub version: String,
    pub task: String,
    pub status: RecordStatus,
    pub attempts: u32,
    pub phases: Vec<Phase>,
    pub current_phase: CurrentPhase,
    pub error_history: Vec<ErrorEntry>,
    pub uncertainties: Vec<Uncertainty>,
    pub artifacts: Vec<FileArtifact>,
    pub success_criteria: Vec<SuccessCriterion>,
    pub completion: Completion,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutionRecord {
    const FIELDS: &'static [&'static str] = &[
        "$schema",
        "version",
        "task",
        "status",
        "attempts",
        "phases",
        "currentPhase",
        "errorHistory",
        "uncertainties",
        "artifacts",
        "successCriteria",
        "completion",
    ];

    /// Build a schema-valid record from arbitrary JSON
    pub fn from_untyped(value: &Value, repairs: &mut Repairs) -> Self {
        let object = object_or_empty(value, "$", repairs);

        let phases: Vec<Phase> = coerce::list(object.get("phases"), "phases", repairs)
            .iter()
            .enumerate()
            .map(|(i, raw)| Phase::from_untyped(raw, i, &index("phases", i), repairs))
            .collect();
        let current_phase = CurrentPhase::from_untyped(object.get("currentPhase"), &phases, "currentPhase", repairs);

        let error_history = coerce::list(object.get("errorHistory"), "errorHistory", repairs)
            .iter()
            .enumerate()
            .map(|(i, raw)| ErrorEntry::from_untyped(raw, &index("errorHistory", i), repairs))
            .collect();
        let uncertainties = coerce::list(object.get("uncertainties"), "uncertainties", repairs)
            .iter()
            .enumerate()
            .map(|(i, raw)| Uncertainty::from_untyped(raw, i, &index("uncertainties", i), repairs))
            .collect();
        let artifacts = coerce::list(object.get("artifacts"), "artifacts", repairs)
            .iter()
            .enumerate()
            .map(|(i, raw)| FileArtifact::from_untyped(raw, &index("artifacts", i), repairs))
            .collect();
        let success_criteria = coerce::list(object.get("successCriteria"), "successCriteria", repairs)
            .iter()
            .enumerate()
            .map(|(i, raw)| SuccessCriterion::from_untyped(raw, &index("successCriteria", i), repairs))
            .collect();

        let schema = match object.get("$schema") {
            Some(Value::String(s)) => Some(s.clone()),
            None | Some(Value::Null) => None,
            Some(other) => {
                repairs.warn("$schema", format!("dropped non-string {}", coerce::type_name(other)));
                None
            }
        };

        Self {
            schema,
            version: coerce::text_or(object.get("version"), DEFAULT_VERSION, "version", repairs),
            task: coerce::text_or(object.get("task"), "", "task", repairs),
            status: RecordStatus::coerce(object.get("status"), "status", repairs),
            attempts: coerce::count(object.get("attempts"), "attempts", repairs).unwrap_or_else(|| {
                repairs.warn("attempts", "defaulted to 0");
                0
            }),
            phases,
            current_phase,
            error_history,
            uncertainties,
            artifacts,
            success_criteria,
            completion: Completion::from_untyped(object.get("completion"), "completion", repairs),
            extra: coerce::extras(&object, Self::FIELDS),
        }
    }

    /// All phase items, in order
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.phases.iter().flat_map(|p| p.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(value: Value) -> (ExecutionRecord, Vec<String>) {
        let mut repairs = Repairs::new();
        let record = ExecutionRecord::from_untyped(&value, &mut repairs);
        let warnings = repairs.into_warnings().iter().map(|w| w.to_string()).collect();
        (record, warnings)
    }

    #[test]
    fn test_empty_object_gets_every_default() {
        let (record, warnings) = build(json!({}));
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.version, DEFAULT_VERSION);
        assert_eq!(record.attempts, 0);
        assert!(record.phases.is_empty());
        assert_eq!(record.current_phase.id, 1);
        assert_eq!(record.completion.status, CompletionStatus::PendingValidation);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_non_object_root() {
        let (record, warnings) = build(json!([1, 2, 3]));
        assert_eq!(record.status, RecordStatus::Pending);
        assert!(warnings.iter().any(|w| w.starts_with("$: expected object")));
    }

    #[test]
    fn test_status_normalization() {
        assert_eq!(RecordStatus::parse("IN-PROGRESS"), Some(RecordStatus::InProgress));
        assert_eq!(RecordStatus::parse("Done"), Some(RecordStatus::Completed));
        assert_eq!(RecordStatus::parse("sideways"), None);
        let (record, _) = build(json!({"status": "sideways"}));
        assert_eq!(record.status, RecordStatus::Pending);
    }

    #[test]
    fn test_phase_defaults() {
        let (record, _) = build(json!({"phases": [{"items": ["write parser", {"description": "test it", "completed": true}]}]}));
        let phase = &record.phases[0];
        assert_eq!(phase.id, 1);
        assert_eq!(phase.name, "Phase 1");
        assert_eq!(phase.status, RecordStatus::Pending);
        assert_eq!(phase.items[0].description, "write parser");
        assert!(!phase.items[0].completed);
        assert!(phase.items[1].completed);
    }

    #[test]
    fn test_pre_condition_missing_command_gets_noop() {
        let (record, _) = build(json!({"phases": [{"id": 1, "name": "P", "preConditions": [{"check": "db up"}, "cache warm"]}]}));
        let conditions = &record.phases[0].pre_conditions;
        assert_eq!(conditions[0].command, NOOP_COMMAND);
        assert!(!conditions[0].passed);
        assert_eq!(conditions[1].check, "cache warm");
        assert_eq!(conditions[1].command, NOOP_COMMAND);
    }

    #[test]
    fn test_string_passed_is_not_true() {
        let (record, _) = build(json!({
            "phases": [{"preConditions": [{"check": "c", "command": "ls", "passed": "true"}]}],
            "successCriteria": [{"criterion": "builds", "command": "cargo build", "passed": "yes"}]
        }));
        assert!(!record.phases[0].pre_conditions[0].passed);
        assert_eq!(record.success_criteria[0].passed, None);
    }

    #[test]
    fn test_success_criterion_type_inference() {
        let (record, _) = build(json!({"successCriteria": [
            {"criterion": "tests pass", "command": "cargo test"},
            {"criterion": "looks right"},
            "reviewed by a human"
        ]}));
        assert_eq!(record.success_criteria[0].test_type, TestType::Auto);
        assert_eq!(record.success_criteria[1].test_type, TestType::Manual);
        assert_eq!(record.success_criteria[2].test_type, TestType::Manual);
        assert_eq!(record.success_criteria[2].passed, None);
    }

    #[test]
    fn test_uncertainty_confidence() {
        let (record, _) = build(json!({"uncertainties": [
            {"topic": "api", "confidence": "high", "resolvedConfidence": "certain"},
            {"topic": "db", "confidence": 0.6},
            {"topic": "ui", "confidence": "maybe"}
        ]}));
        assert_eq!(record.uncertainties[0].id, "U1");
        assert_eq!(record.uncertainties[0].confidence, Confidence::High);
        assert_eq!(record.uncertainties[0].resolved_confidence, None);
        assert_eq!(record.uncertainties[1].confidence, Confidence::Medium);
        assert_eq!(record.uncertainties[2].confidence, Confidence::Low);
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let (record, _) = build(json!({"notes": "keep me", "phases": [{"owner": "a"}]}));
        assert_eq!(record.extra.get("notes"), Some(&json!("keep me")));
        assert_eq!(record.phases[0].extra.get("owner"), Some(&json!("a")));
    }

    #[test]
    fn test_free_text_is_preserved() {
        let (record, _) = build(json!({"task": "TASK7", "completion": {"status": "done", "summary": "did it"}}));
        assert_eq!(record.task, "TASK7");
        assert_eq!(record.completion.status, CompletionStatus::Completed);
        assert_eq!(record.completion.summary, vec!["did it".to_string()]);
    }

    #[test]
    fn test_current_phase_derived_from_phases() {
        let (record, _) = build(json!({"phases": [
            {"id": 1, "name": "Prep", "status": "completed"},
            {"id": 2, "name": "Build", "status": "in_progress"}
        ]}));
        assert_eq!(record.current_phase.id, 2);
        assert_eq!(record.current_phase.name, "Build");
    }

    #[test]
    fn test_artifact_aliases() {
        let (record, _) = build(json!({"artifacts": [{"action": "create", "file": "src/a.rs"}, "src/b.rs"]}));
        assert_eq!(record.artifacts[0].action, ArtifactAction::Created);
        assert_eq!(record.artifacts[0].path, "src/a.rs");
        assert_eq!(record.artifacts[1].action, ArtifactAction::Modified);
    }

    #[test]
    fn test_enum_serialization_shape() {
        assert_eq!(serde_json::to_value(RecordStatus::InProgress).unwrap(), json!("in_progress"));
        assert_eq!(serde_json::to_value(CompletionStatus::PendingValidation).unwrap(), json!("pending_validation"));
        assert_eq!(serde_json::to_value(Confidence::Medium).unwrap(), json!("MEDIUM"));
        assert_eq!(serde_json::to_value(TestType::Both).unwrap(), json!("BOTH"));
        assert_eq!(serde_json::to_value(ArtifactAction::Deleted).unwrap(), json!("deleted"));
    }

    #[test]
    fn test_enum_defaults_match_repair_defaults() {
        assert_eq!(RecordStatus::default(), RecordStatus::Pending);
        assert_eq!(CompletionStatus::default(), CompletionStatus::PendingValidation);
        assert_eq!(Confidence::default(), Confidence::Low);
        assert_eq!(TestType::default(), TestType::Manual);
        assert_eq!(ArtifactAction::default(), ArtifactAction::Modified);
    }
}
