//! Total, idempotent repair of worker-written execution records

use serde_json::Value;

use super::coerce::{RepairWarning, Repairs};
use super::record::ExecutionRecord;
use crate::error::Result;

/// A schema-valid record plus the list of changes it took to get there
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedRecord {
    pub record: ExecutionRecord,
    pub warnings: Vec<RepairWarning>,
}

impl RepairedRecord {
    /// True when the input needed no changes
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.record)?)
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.record)?;
        out.push('\n');
        Ok(out)
    }
}

/// Repair an arbitrary JSON value into a valid execution record.
///
/// Never fails. Running it again on its own output yields the same record
/// and no warnings.
pub fn repair(raw: &Value) -> RepairedRecord {
    let mut repairs = Repairs::new();
    let record = ExecutionRecord::from_untyped(raw, &mut repairs);
    RepairedRecord {
        record,
        warnings: repairs.into_warnings(),
    }
}

/// Parse record text the way workers tend to write it.
///
/// Accepts plain JSON, JSON inside a markdown code fence, or JSON surrounded by
/// prose. Returns `None` when no object can be recovered.
pub fn parse_lenient(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let unfenced = strip_code_fence(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Some(value);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&unfenced[start..=end]).ok()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (```json)
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Remove control characters (other than newline, tab and carriage return)
/// from every string in the document.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(
            s.chars()
                .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), sanitize(v))).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn malformed_inputs() -> Vec<Value> {
        vec![
            json!(null),
            json!("just text"),
            json!([]),
            json!({}),
            json!({"status": "DONE", "attempts": "2", "phases": "one phase"}),
            json!({
                "phases": [
                    {"id": "2", "name": 7, "status": "wip", "items": ["a", {"task": "b", "completed": "yes"}],
                     "preConditions": [{"check": "db", "passed": 1}, "cache"]},
                    null
                ],
                "currentPhase": "2",
                "uncertainties": [{"confidence": 0.95, "resolvedConfidence": 0.1}, "naming"],
                "artifacts": [{"type": "ADD", "path": "a.rs"}, 3],
                "successCriteria": [{"criterion": "tests", "command": "cargo test", "passed": "true"}, {"testType": "weird"}],
                "completion": "finished everything",
                "errorHistory": ["boom", {"error": "bang", "timestamp": 12}],
                "custom": {"kept": true}
            }),
            json!({"completion": {"status": "error", "summary": "one", "deviations": null}}),
        ]
    }

    #[test]
    fn test_repair_is_idempotent() {
        for input in malformed_inputs() {
            let first = repair(&input);
            let second = repair(&first.to_value().unwrap());
            assert_eq!(first.record, second.record, "unstable repair for {}", input);
            assert!(second.is_clean(), "second pass changed {}: {:?}", input, second.warnings);
        }
    }

    #[test]
    fn test_repair_never_fabricates_pass() {
        for input in malformed_inputs() {
            let repaired = repair(&input).record;
            for phase in &repaired.phases {
                assert!(phase.pre_conditions.iter().all(|c| !c.passed));
                assert!(phase.items.iter().all(|i| !i.completed));
            }
            assert!(repaired.success_criteria.iter().all(|c| c.passed != Some(true)));
        }
    }

    #[test]
    fn test_valid_passes_survive() {
        let input = json!({
            "phases": [{"id": 1, "name": "P", "status": "completed",
                        "preConditions": [{"check": "c", "command": "ls", "expected": "", "passed": true, "evidence": "ok"}],
                        "items": [{"description": "d", "completed": true}]}],
            "successCriteria": [{"criterion": "c", "source": "s", "testType": "AUTO", "command": "make", "manualCheck": null, "passed": true}]
        });
        let repaired = repair(&input).record;
        assert!(repaired.phases[0].pre_conditions[0].passed);
        assert!(repaired.phases[0].items[0].completed);
        assert_eq!(repaired.success_criteria[0].passed, Some(true));
    }

    #[test]
    fn test_repair_keeps_unknown_top_level_fields() {
        let input = json!({"custom": {"kept": true}});
        let value = repair(&input).to_value().unwrap();
        assert_eq!(value["custom"], json!({"kept": true}));
        assert_eq!(value["status"], json!("pending"));
    }

    #[test]
    fn test_parse_lenient_plain() {
        assert_eq!(parse_lenient("{\"a\": 1}"), Some(json!({"a": 1})));
    }

    #[test]
    fn test_parse_lenient_fenced() {
        let text = "```json\n{\"status\": \"pending\"}\n```\n";
        assert_eq!(parse_lenient(text), Some(json!({"status": "pending"})));
    }

    #[test]
    fn test_parse_lenient_with_prose() {
        let text = "Here is the record:\n{\"task\": \"T1\"}\nLet me know.";
        assert_eq!(parse_lenient(text), Some(json!({"task": "T1"})));
    }

    #[test]
    fn test_parse_lenient_garbage() {
        assert_eq!(parse_lenient("not json at all"), None);
        assert_eq!(parse_lenient("} backwards {"), None);
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        let input = json!({"task": "a\u{0007}b", "list": ["x\u{0000}", "keep\nnewline\tand tab"]});
        let clean = sanitize(&input);
        assert_eq!(clean["task"], json!("ab"));
        assert_eq!(clean["list"][0], json!("x"));
        assert_eq!(clean["list"][1], json!("keep\nnewline\tand tab"));
    }
}
