//! Tolerant parsing helpers for heterogeneous upstream JSON shapes (§9
//! "Dynamic permissive parsing"): the indexer's registration-file fields
//! are user-submitted and show up as either a list of bare strings or a
//! list of `{slug}`/`{name}` objects depending on which version of the
//! on-chain schema wrote them. Every helper here returns a canonical
//! `Vec<String>` plus whatever it had to paper over.

use serde_json::Value;

/// One thing a permissive parse had to work around, attributed to the
/// field it came from so a caller can log it against the owning record.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseWarning {
    pub field: String,
    pub message: String,
}

impl ParseWarning {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self { field: field.to_string(), message: message.into() }
    }
}

/// Accept a JSON array whose elements are either plain strings or objects
/// carrying one of `string_keys` (tried in order). Non-matching elements
/// are dropped and recorded as a warning; a non-array value yields an
/// empty list and a warning of its own.
pub fn string_list_permissive(
    value: Option<&Value>,
    field: &str,
    string_keys: &[&str],
) -> (Vec<String>, Vec<ParseWarning>) {
    let mut warnings = Vec::new();
    let Some(value) = value else {
        return (Vec::new(), warnings);
    };
    let Some(array) = value.as_array() else {
        if !value.is_null() {
            warnings.push(ParseWarning::new(field, format!("expected array, got {value}")));
        }
        return (Vec::new(), warnings);
    };

    let mut out = Vec::with_capacity(array.len());
    for (i, item) in array.iter().enumerate() {
        if let Some(s) = item.as_str() {
            out.push(s.to_string());
            continue;
        }
        if let Some(found) = string_keys.iter().find_map(|key| item.get(key)).and_then(Value::as_str) {
            out.push(found.to_string());
            continue;
        }
        warnings.push(ParseWarning::new(field, format!("element {i} was neither a string nor {string_keys:?}")));
    }
    (out, warnings)
}

pub fn str_field(value: &Value, field: &str) -> String {
    value.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
}

pub fn bool_field(value: &Value, field: &str) -> bool {
    value.get(field).and_then(Value::as_bool).unwrap_or(false)
}
