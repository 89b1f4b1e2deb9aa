//! `GET /agents` query-string parsing.
//!
//! `axum::extract::Query` alone can't express this endpoint: its filters
//! are nested one level down (`filters.skills`, not `skills`), and three
//! of them are arrays that callers may spell either as a single
//! comma-separated value (`skills=coding,defi`) or as repeated/bracketed
//! keys (`skills=coding&skills=defi`, `skills[]=coding&skills[]=defi`).
//! This module folds the flat query string into the JSON shape
//! `gateway_search::SearchRequest` expects and lets `serde_json` do the
//! rest of the validation.

use gateway_core::GatewayError;
use gateway_search::SearchRequest;
use serde_json::{Map, Value};

const ARRAY_FILTER_KEYS: &[&str] = &["chainIds", "skills", "domains"];

const TOP_LEVEL_KEYS: &[&str] =
    &["query", "limit", "offset", "cursor", "minScore", "sortField", "sortOrder", "useHyde", "useReranker"];

pub fn parse_agents_query(raw: &str) -> gateway_core::Result<SearchRequest> {
    let mut top = Map::new();
    let mut filters = Map::new();
    let mut arrays: Map<String, Value> = Map::new();

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        let key = key.into_owned();
        let value = value.into_owned();
        let bare_key = key.strip_suffix("[]").unwrap_or(&key).to_string();

        if ARRAY_FILTER_KEYS.contains(&bare_key.as_str()) {
            // `chainIds` deserializes into `Option<Vec<u64>>`; the other
            // array filters (`skills`, `domains`) are `Vec<String>`. Numeric
            // pieces need a JSON number, not a string serde won't coerce.
            let numeric = bare_key == "chainIds";
            let entry = arrays.entry(bare_key).or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                for piece in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    items.push(if numeric { parse_scalar(piece) } else { Value::String(piece.to_string()) });
                }
            }
            continue;
        }

        if TOP_LEVEL_KEYS.contains(&key.as_str()) {
            top.insert(key, parse_scalar(&value));
        } else {
            filters.insert(key, parse_scalar(&value));
        }
    }

    for (key, value) in arrays {
        filters.insert(key, value);
    }

    if !filters.is_empty() {
        top.insert("filters".to_string(), Value::Object(filters));
    }

    if let Some(sort_field) = top.remove("sortField") {
        let order = top.remove("sortOrder").unwrap_or_else(|| Value::String("desc".to_string()));
        let mut sort = Map::new();
        sort.insert("field".to_string(), sort_field);
        sort.insert("order".to_string(), order);
        top.insert("sort".to_string(), Value::Object(sort));
    }

    serde_json::from_value(Value::Object(top))
        .map_err(|e| GatewayError::Validation(format!("invalid query parameters: {e}")))
}

/// Query strings carry everything as text; coerce the obvious JSON scalar
/// types so downstream `serde` deserialization (bools, numbers, RFC3339
/// timestamps as strings) behaves the same as it would for a JSON body.
fn parse_scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = raw.parse::<u64>() {
                Value::Number(n.into())
            } else if let Ok(n) = raw.parse::<f64>() {
                serde_json::Number::from_f64(n).map(Value::Number).unwrap_or_else(|| Value::String(raw.to_string()))
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}
