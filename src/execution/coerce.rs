//! Field-level coercion of untyped JSON into typed values.
//!
//! Every helper is total and records a warning whenever it had to change
//! something. Helpers never turn a non-boolean into `true`.

use std::fmt;

use serde_json::{Map, Value};

/// One change made while repairing a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairWarning {
    /// JSON path of the repaired field (e.g. `phases[0].status`)
    pub path: String,
    /// What was changed
    pub message: String,
}

impl RepairWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RepairWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Collects warnings while walking a record
#[derive(Debug, Default)]
pub struct Repairs {
    warnings: Vec<RepairWarning>,
}

impl Repairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(RepairWarning::new(path, message));
    }

    pub fn into_warnings(self) -> Vec<RepairWarning> {
        self.warnings
    }
}

/// Join a parent path and a field name
pub fn child(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

/// Path of an array element
pub fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}

/// Human name of a JSON type, for warnings
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Free text. Scalars are stringified; arrays/objects are kept as compact JSON text.
pub fn text(value: Option<&Value>, path: &str, repairs: &mut Repairs) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => {
            repairs.warn(path, "converted number to string");
            Some(n.to_string())
        }
        Some(Value::Bool(b)) => {
            repairs.warn(path, "converted boolean to string");
            Some(b.to_string())
        }
        Some(other) => {
            repairs.warn(path, format!("converted {} to JSON text", type_name(other)));
            Some(other.to_string())
        }
    }
}

/// Free text with a default when missing
pub fn text_or(value: Option<&Value>, default: &str, path: &str, repairs: &mut Repairs) -> String {
    match text(value, path, repairs) {
        Some(s) => s,
        None => {
            repairs.warn(path, format!("missing, defaulted to {:?}", default));
            default.to_string()
        }
    }
}

/// Non-negative integer; accepts numeric strings and truncates fractions
pub fn count(value: Option<&Value>, path: &str, repairs: &mut Repairs) -> Option<u32> {
    let value = value?;
    let parsed = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Some(u.min(u32::MAX as u64) as u32);
            }
            n.as_f64()
        }
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return None,
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => {
            let clamped = f.max(0.0).min(u32::MAX as f64).trunc() as u32;
            repairs.warn(path, format!("coerced {} to {}", value, clamped));
            Some(clamped)
        }
        _ => {
            repairs.warn(path, format!("dropped non-numeric {}", type_name(value)));
            None
        }
    }
}

/// Boolean that only accepts real booleans. Anything else is `None`.
pub fn strict_bool(value: Option<&Value>, path: &str, repairs: &mut Repairs) -> Option<bool> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            repairs.warn(path, format!("ignored non-boolean {}", type_name(other)));
            None
        }
    }
}

/// Elements of a list field. A lone non-null value is wrapped into a one-element list.
pub fn list(value: Option<&Value>, path: &str, repairs: &mut Repairs) -> Vec<Value> {
    match value {
        None => {
            repairs.warn(path, "missing, defaulted to []");
            Vec::new()
        }
        Some(Value::Null) => {
            repairs.warn(path, "null, defaulted to []");
            Vec::new()
        }
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            repairs.warn(path, format!("wrapped {} into a list", type_name(other)));
            vec![other.clone()]
        }
    }
}

/// List of free-text strings
pub fn text_list(value: Option<&Value>, path: &str, repairs: &mut Repairs) -> Vec<String> {
    list(value, path, repairs)
        .iter()
        .enumerate()
        .filter_map(|(i, item)| text(Some(item), &index(path, i), repairs))
        .collect()
}

/// Normalize an enum token: lowercase, `-` and spaces to `_`
pub fn enum_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Keys of `object` that are not in `known`
pub fn extras(object: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// First present, non-null alias of a field
pub fn first_of<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key).filter(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_keeps_strings_and_stringifies_scalars() {
        let mut repairs = Repairs::new();
        assert_eq!(text(Some(&json!("a")), "x", &mut repairs), Some("a".to_string()));
        assert_eq!(text(Some(&json!(5)), "x", &mut repairs), Some("5".to_string()));
        assert_eq!(text(Some(&json!(null)), "x", &mut repairs), None);
        assert_eq!(text(Some(&json!({"k": 1})), "x", &mut repairs), Some("{\"k\":1}".to_string()));
        assert_eq!(repairs.into_warnings().len(), 2);
    }

    #[test]
    fn test_count() {
        let mut repairs = Repairs::new();
        assert_eq!(count(Some(&json!(3)), "a", &mut repairs), Some(3));
        assert_eq!(count(Some(&json!(-2)), "a", &mut repairs), Some(0));
        assert_eq!(count(Some(&json!(2.7)), "a", &mut repairs), Some(2));
        assert_eq!(count(Some(&json!("4")), "a", &mut repairs), Some(4));
        assert_eq!(count(Some(&json!("many")), "a", &mut repairs), None);
        assert_eq!(count(None, "a", &mut repairs), None);
    }

    #[test]
    fn test_strict_bool_never_invents_true() {
        let mut repairs = Repairs::new();
        assert_eq!(strict_bool(Some(&json!(true)), "p", &mut repairs), Some(true));
        assert_eq!(strict_bool(Some(&json!("true")), "p", &mut repairs), None);
        assert_eq!(strict_bool(Some(&json!(1)), "p", &mut repairs), None);
        assert_eq!(strict_bool(Some(&json!("yes")), "p", &mut repairs), None);
    }

    #[test]
    fn test_list_wraps_single_values() {
        let mut repairs = Repairs::new();
        assert_eq!(list(Some(&json!("one")), "l", &mut repairs), vec![json!("one")]);
        assert!(list(None, "l", &mut repairs).is_empty());
        assert_eq!(list(Some(&json!([1, 2])), "l", &mut repairs).len(), 2);
    }

    #[test]
    fn test_enum_key() {
        assert_eq!(enum_key(" In-Progress "), "in_progress");
        assert_eq!(enum_key("PENDING VALIDATION"), "pending_validation");
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(child("", "status"), "status");
        assert_eq!(child("phases[0]", "items"), "phases[0].items");
        assert_eq!(index("phases", 2), "phases[2]");
    }
}
