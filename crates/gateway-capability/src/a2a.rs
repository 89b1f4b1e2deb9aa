//! A2A (agent card) fetch (§4.4). Tries the hint URL as-is if it already
//! names a well-known path, else tries the two canonical candidate paths
//! in order. Every failure degrades to an empty result with `error` set;
//! this fetcher never propagates an error to its caller.

use crate::ssrf::admit;
use serde_json::Value;
use std::time::Duration;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct A2aFetchResult {
    pub input_modes: Vec<String>,
    pub output_modes: Vec<String>,
    pub skill_names: Vec<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl A2aFetchResult {
    fn failure(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Default::default() }
    }
}

fn candidate_urls(hint_url: &str) -> Vec<String> {
    if hint_url.contains(".well-known/agent") {
        return vec![hint_url.to_string()];
    }
    let base = hint_url.trim_end_matches('/');
    vec![format!("{base}/.well-known/agent.json"), format!("{base}/.well-known/agent-card.json")]
}

pub async fn fetch_a2a_agent_card(client: &reqwest::Client, hint_url: &str) -> A2aFetchResult {
    let mut last_error = String::new();

    for candidate in candidate_urls(hint_url) {
        let url = match admit(&candidate) {
            Ok(url) => url,
            Err(e) => {
                last_error = e.to_string();
                continue;
            }
        };

        let response = match client.get(url).timeout(FETCH_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = e.to_string();
                continue;
            }
        };

        if !response.status().is_success() {
            last_error = format!("{} returned {}", candidate, response.status());
            continue;
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                last_error = e.to_string();
                continue;
            }
        };

        let result = parse_agent_card(&body);
        if !result.input_modes.is_empty()
            || !result.output_modes.is_empty()
            || !result.skill_names.is_empty()
        {
            return A2aFetchResult { success: true, error: None, ..result };
        }
        last_error = format!("{candidate} returned an empty agent card");
    }

    A2aFetchResult::failure(last_error)
}

fn parse_agent_card(body: &Value) -> A2aFetchResult {
    let default_input_modes = string_array(body.get("defaultInputModes"));
    let default_output_modes = string_array(body.get("defaultOutputModes"));

    let mut input_modes: Vec<String> = default_input_modes;
    let mut output_modes: Vec<String> = default_output_modes;
    let mut skill_names = Vec::new();

    if let Some(skills) = body.get("skills").and_then(Value::as_array) {
        for skill in skills {
            input_modes.extend(string_array(skill.get("inputModes")));
            output_modes.extend(string_array(skill.get("outputModes")));
            if let Some(name) = skill.get("name").and_then(Value::as_str) {
                skill_names.push(name.to_string());
            } else if let Some(id) = skill.get("id").and_then(Value::as_str) {
                skill_names.push(id.to_string());
            }
        }
    }

    dedup(&mut input_modes);
    dedup(&mut output_modes);
    dedup(&mut skill_names);

    A2aFetchResult { input_modes, output_modes, skill_names, success: false, error: None }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn dedup(values: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    values.retain(|v| seen.insert(v.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_urls_uses_hint_as_is_when_well_known_present() {
        let candidates = candidate_urls("https://agent.example.com/.well-known/agent.json");
        assert_eq!(candidates, vec!["https://agent.example.com/.well-known/agent.json".to_string()]);
    }

    #[test]
    fn candidate_urls_tries_both_canonical_paths() {
        let candidates = candidate_urls("https://agent.example.com");
        assert_eq!(
            candidates,
            vec![
                "https://agent.example.com/.well-known/agent.json".to_string(),
                "https://agent.example.com/.well-known/agent-card.json".to_string(),
            ]
        );
    }

    #[test]
    fn parses_union_of_default_and_skill_modes() {
        let body = json!({
            "defaultInputModes": ["text"],
            "defaultOutputModes": ["text"],
            "skills": [
                {"name": "search", "inputModes": ["text", "image"], "outputModes": ["text"]},
                {"id": "summarize", "outputModes": ["text", "audio"]}
            ]
        });
        let result = parse_agent_card(&body);
        assert_eq!(result.input_modes, vec!["text".to_string(), "image".to_string()]);
        assert_eq!(result.output_modes, vec!["text".to_string(), "audio".to_string()]);
        assert_eq!(result.skill_names, vec!["search".to_string(), "summarize".to_string()]);
    }

    #[test]
    fn ignores_non_string_entries_in_mode_arrays() {
        let body = json!({"defaultInputModes": ["text", 5, null]});
        let result = parse_agent_card(&body);
        assert_eq!(result.input_modes, vec!["text".to_string()]);
    }
}
