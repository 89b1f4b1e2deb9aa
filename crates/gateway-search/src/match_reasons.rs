//! Derives the human-readable `matchReasons` tags attached to each search
//! result (§4.14 step 5 / §6 response shape): a short list of why this
//! agent surfaced, read straight off its stored payload.

use std::collections::BTreeMap;

use serde_json::Value;

const HIGH_RELEVANCE_THRESHOLD: f32 = 0.8;
const MODERATE_RELEVANCE_THRESHOLD: f32 = 0.5;

fn payload_bool(payload: &BTreeMap<String, Value>, key: &str) -> bool {
    payload.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn payload_non_empty_array(payload: &BTreeMap<String, Value>, key: &str) -> bool {
    payload.get(key).and_then(Value::as_array).map(|arr| !arr.is_empty()).unwrap_or(false)
}

/// Builds the reason tags for one hit. When nothing else applies (a
/// filtered listing with no query, or a hit that matched purely on
/// filters), the result defaults to `["filter_match"]` rather than an
/// empty list.
pub fn derive(score: Option<f32>, payload: &BTreeMap<String, Value>) -> Vec<String> {
    let mut reasons = Vec::new();

    if let Some(score) = score {
        if score >= HIGH_RELEVANCE_THRESHOLD {
            reasons.push("high_relevance".to_string());
        } else if score >= MODERATE_RELEVANCE_THRESHOLD {
            reasons.push("moderate_relevance".to_string());
        }
    }

    if payload_non_empty_array(payload, "skills") {
        reasons.push("has_skills".to_string());
    }
    if payload_non_empty_array(payload, "domains") {
        reasons.push("has_domains".to_string());
    }
    if payload_bool(payload, "mcp") {
        reasons.push("has_mcp".to_string());
    }
    if payload_bool(payload, "a2a") {
        reasons.push("has_a2a".to_string());
    }
    if payload_bool(payload, "x402") {
        reasons.push("has_x402".to_string());
    }

    if reasons.is_empty() {
        reasons.push("filter_match".to_string());
    }

    reasons
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn high_score_yields_high_relevance() {
        let payload = BTreeMap::new();
        let reasons = derive(Some(0.95), &payload);
        assert_eq!(reasons, vec!["high_relevance".to_string()]);
    }

    #[test]
    fn moderate_score_yields_moderate_relevance() {
        let payload = BTreeMap::new();
        let reasons = derive(Some(0.6), &payload);
        assert_eq!(reasons, vec!["moderate_relevance".to_string()]);
    }

    #[test]
    fn low_score_with_protocol_flags() {
        let mut payload = BTreeMap::new();
        payload.insert("mcp".to_string(), json!(true));
        payload.insert("skills".to_string(), json!(["summarization"]));
        let reasons = derive(Some(0.1), &payload);
        assert!(reasons.contains(&"has_mcp".to_string()));
        assert!(reasons.contains(&"has_skills".to_string()));
        assert!(!reasons.contains(&"high_relevance".to_string()));
    }

    #[test]
    fn no_signal_defaults_to_filter_match() {
        let payload = BTreeMap::new();
        let reasons = derive(None, &payload);
        assert_eq!(reasons, vec!["filter_match".to_string()]);
    }
}
