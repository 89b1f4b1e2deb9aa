//! MCP (JSON-RPC) fetch (§4.4): `tools/list`, `prompts/list`, and
//! `resources/list` issued in parallel against a normalized endpoint.
//! Partial success is first-class: whichever calls succeed are kept, and
//! the rest contribute to a concatenated error string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::ssrf::admit;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct McpFetchResult {
    pub tools: Vec<String>,
    pub prompts: Vec<String>,
    pub resources: Vec<McpResource>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct McpResource {
    pub uri: String,
    pub name: String,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    message: String,
}

/// Upgrade to https and drop a trailing slash, matching the normalization
/// rule in §4.4.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let upgraded = if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("https://{rest}")
    } else {
        endpoint.to_string()
    };
    upgraded.trim_end_matches('/').to_string()
}

pub async fn fetch_mcp_capabilities(client: &reqwest::Client, endpoint: &str) -> McpFetchResult {
    let endpoint = normalize_endpoint(endpoint);

    let (tools_res, prompts_res, resources_res) = tokio::join!(
        call(client, &endpoint, "tools/list"),
        call(client, &endpoint, "prompts/list"),
        call(client, &endpoint, "resources/list"),
    );

    let mut errors = Vec::new();

    let tools = match tools_res {
        Ok(value) => extract_named_entries(&value, "tools", &["name"]),
        Err(e) => {
            errors.push(format!("tools/list: {e}"));
            Vec::new()
        }
    };
    let prompts = match prompts_res {
        Ok(value) => extract_named_entries(&value, "prompts", &["name"]),
        Err(e) => {
            errors.push(format!("prompts/list: {e}"));
            Vec::new()
        }
    };
    let resources = match resources_res {
        Ok(value) => extract_resources(&value),
        Err(e) => {
            errors.push(format!("resources/list: {e}"));
            Vec::new()
        }
    };

    let error = if errors.is_empty() { None } else { Some(errors.join("; ")) };

    McpFetchResult { tools, prompts, resources, error }
}

async fn call(client: &reqwest::Client, endpoint: &str, method: &str) -> Result<Value, String> {
    let url = admit(endpoint).map_err(|e| e.to_string())?;
    let request = JsonRpcRequest { jsonrpc: "2.0", id: next_id(), method, params: Value::Object(Default::default()) };

    let response = client
        .post(url)
        .json(&request)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    let body: JsonRpcResponse = response.json().await.map_err(|e| e.to_string())?;
    if let Some(err) = body.error {
        return Err(err.message);
    }
    body.result.ok_or_else(|| "missing result".to_string())
}

fn extract_named_entries(result: &Value, list_key: &str, name_keys: &[&str]) -> Vec<String> {
    let Some(entries) = result.get(list_key).and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| name_keys.iter().find_map(|key| entry.get(key)).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn extract_resources(result: &Value) -> Vec<McpResource> {
    let Some(entries) = result.get("resources").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let uri = entry.get("uri").and_then(Value::as_str)?;
            let name = entry.get("name").and_then(Value::as_str)?;
            Some(McpResource { uri: uri.to_string(), name: name.to_string() })
        })
        .collect()
}
