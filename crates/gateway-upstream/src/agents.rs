//! The `agents` query (§6, §4.10 step 1): paginated pull of every agent
//! record from the upstream indexer, with registration-file fields
//! inlined into the node rather than nested under a sub-object.

use chrono::{DateTime, TimeZone, Utc};
use gateway_core::agent::{AgentId, AgentRecord, ScoredSlug};
use serde_json::{json, Value};

use crate::client::UpstreamClient;
use crate::error::UpstreamResult;
use crate::lenient::{bool_field, str_field, string_list_permissive, ParseWarning};

/// Page size for the `agents` query (§4.10 step 1).
pub const AGENTS_PAGE_SIZE: u32 = 1000;

/// Total records pulled across all pages in one graph-sync run, regardless
/// of page size, as a guard against a runaway upstream.
pub const AGENTS_SAFETY_CAP: usize = 10_000;

const AGENTS_QUERY: &str = r#"
query Agents($first: Int!, $skip: Int!, $orderBy: String!) {
  agents(first: $first, skip: $skip, orderBy: $orderBy) {
    chainId
    tokenId
    name
    description
    imageUrl
    active
    hasMcp
    hasA2a
    hasX402
    hasRegistrationFile
    mcpEndpoint
    a2aEndpoint
    oasfEndpoint
    email
    mcpVersion
    a2aVersion
    mcpTools
    mcpPrompts
    mcpResources
    a2aSkills
    declaredSkills
    declaredDomains
    ens
    did
    owner
    walletAddress
    operatorAddresses
    supportedTrustSystems
    agentUri
    createdAt
    updatedAt
  }
}
"#;

/// One agent node plus the record it was parsed into, attributed so a
/// caller can log warnings against the agent they came from.
pub struct ParsedAgent {
    pub record: AgentRecord,
    pub warnings: Vec<ParseWarning>,
}

/// Outcome of a full paginated pull, bounded by [`AGENTS_SAFETY_CAP`].
pub struct AgentsPull {
    pub agents: Vec<ParsedAgent>,
    /// True if the safety cap was hit before the upstream ran out of pages.
    pub truncated: bool,
}

/// Pull every agent record from the upstream indexer, paginating at
/// [`AGENTS_PAGE_SIZE`] per request until either the upstream returns a
/// short page (end of data) or [`AGENTS_SAFETY_CAP`] total records have
/// been pulled.
pub async fn pull_agents(client: &UpstreamClient) -> UpstreamResult<AgentsPull> {
    let mut agents = Vec::new();
    let mut skip: u32 = 0;
    let mut truncated = false;

    loop {
        let remaining_budget = AGENTS_SAFETY_CAP.saturating_sub(agents.len());
        if remaining_budget == 0 {
            truncated = true;
            break;
        }
        let first = AGENTS_PAGE_SIZE.min(remaining_budget as u32);

        let data = client
            .query(AGENTS_QUERY, json!({"first": first, "skip": skip, "orderBy": "tokenId"}))
            .await?;

        let nodes = data.get("agents").and_then(Value::as_array).cloned().unwrap_or_default();
        let page_len = nodes.len();

        for node in nodes {
            agents.push(parse_agent_node(&node));
        }

        if page_len < first as usize {
            break;
        }
        skip += first;
    }

    Ok(AgentsPull { agents, truncated })
}

fn parse_agent_node(node: &Value) -> ParsedAgent {
    let mut warnings = Vec::new();

    let chain_id = node.get("chainId").and_then(Value::as_u64).unwrap_or_else(|| {
        warnings.push(ParseWarning { field: "chainId".into(), message: "missing or non-numeric, defaulting to 0".into() });
        0
    });
    let token_id = str_field(node, "tokenId");

    let id = match AgentId::new(chain_id, &token_id) {
        Ok(id) => id,
        Err(e) => {
            warnings.push(ParseWarning { field: "tokenId".into(), message: e.to_string() });
            AgentId::new(chain_id, "0").unwrap_or_else(|_| AgentId::new(0, "0").expect("0:0 is valid"))
        }
    };

    let (mcp_tools, w) = string_list_permissive(node.get("mcpTools"), "mcpTools", &["name"]);
    warnings.extend(w);
    let (mcp_prompts, w) = string_list_permissive(node.get("mcpPrompts"), "mcpPrompts", &["name"]);
    warnings.extend(w);
    let (mcp_resources, w) = string_list_permissive(node.get("mcpResources"), "mcpResources", &["name", "uri"]);
    warnings.extend(w);
    let (a2a_skills, w) = string_list_permissive(node.get("a2aSkills"), "a2aSkills", &["name", "id"]);
    warnings.extend(w);
    let (declared_skills, w) = string_list_permissive(node.get("declaredSkills"), "declaredSkills", &["slug"]);
    warnings.extend(w);
    let (declared_domains, w) = string_list_permissive(node.get("declaredDomains"), "declaredDomains", &["slug"]);
    warnings.extend(w);
    let (operator_addresses, w) = string_list_permissive(node.get("operatorAddresses"), "operatorAddresses", &[]);
    warnings.extend(w);
    let (supported_trust_systems, w) =
        string_list_permissive(node.get("supportedTrustSystems"), "supportedTrustSystems", &[]);
    warnings.extend(w);

    let created_at = parse_timestamp(node.get("createdAt"), "createdAt", &mut warnings);
    let updated_at = parse_timestamp(node.get("updatedAt"), "updatedAt", &mut warnings);

    let mut record = AgentRecord {
        id,
        name: str_field(node, "name"),
        description: str_field(node, "description"),
        image_url: str_field(node, "imageUrl"),
        active: bool_field(node, "active"),
        has_mcp: bool_field(node, "hasMcp"),
        has_a2a: bool_field(node, "hasA2a"),
        has_x402: bool_field(node, "hasX402"),
        has_registration_file: bool_field(node, "hasRegistrationFile"),
        mcp_endpoint: str_field(node, "mcpEndpoint"),
        a2a_endpoint: str_field(node, "a2aEndpoint"),
        oasf_endpoint: str_field(node, "oasfEndpoint"),
        email: str_field(node, "email"),
        mcp_version: str_field(node, "mcpVersion"),
        a2a_version: str_field(node, "a2aVersion"),
        mcp_tools,
        mcp_prompts,
        mcp_resources,
        a2a_skills,
        declared_skills,
        declared_domains,
        ens: str_field(node, "ens"),
        did: str_field(node, "did"),
        owner: str_field(node, "owner"),
        wallet_address: str_field(node, "walletAddress"),
        operator_addresses,
        supported_trust_systems,
        agent_uri: str_field(node, "agentUri"),
        created_at,
        updated_at,
        resolved_skills: Vec::<ScoredSlug>::new(),
        resolved_domains: Vec::<ScoredSlug>::new(),
        reputation: 0.0,
        trust_score: 0.0,
        reachable_mcp: false,
        reachable_a2a: false,
        last_reachability_check_at: None,
        curated_by: Vec::new(),
        input_modes: Vec::new(),
        output_modes: Vec::new(),
    };
    record.normalize_addresses();

    ParsedAgent { record, warnings }
}

fn parse_timestamp(value: Option<&Value>, field: &str, warnings: &mut Vec<ParseWarning>) -> DateTime<Utc> {
    match value {
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                warnings.push(ParseWarning { field: field.into(), message: format!("{e}, defaulting to epoch") });
                Utc.timestamp_opt(0, 0).single().unwrap_or_default()
            }
        },
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| {
                warnings.push(ParseWarning { field: field.into(), message: "numeric timestamp out of range".into() });
                Utc.timestamp_opt(0, 0).single().unwrap_or_default()
            }),
        _ => {
            warnings.push(ParseWarning { field: field.into(), message: "missing, defaulting to epoch".into() });
            Utc.timestamp_opt(0, 0).single().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_well_formed_node() {
        let node = json!({
            "chainId": 11155111,
            "tokenId": "1",
            "name": "Agent One",
            "description": "does things",
            "active": true,
            "hasMcp": true,
            "mcpTools": ["search", "fetch"],
            "declaredSkills": [{"slug": "nlp"}, "vision"],
            "owner": "0xABCDEF",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-06-01T00:00:00Z"
        });
        let parsed = parse_agent_node(&node);
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.record.id, AgentId::new(11155111, "1").unwrap());
        assert_eq!(parsed.record.mcp_tools, vec!["search", "fetch"]);
        assert_eq!(parsed.record.declared_skills, vec!["nlp", "vision"]);
        assert_eq!(parsed.record.owner, "0xabcdef");
    }

    #[test]
    fn missing_timestamp_defaults_to_epoch_with_warning() {
        let node = json!({"chainId": 1, "tokenId": "7"});
        let parsed = parse_agent_node(&node);
        assert_eq!(parsed.record.created_at.timestamp(), 0);
        assert!(parsed.warnings.iter().any(|w| w.field == "createdAt"));
    }

    #[test]
    fn accepts_unix_seconds_timestamp() {
        let node = json!({"chainId": 1, "tokenId": "7", "createdAt": 1_700_000_000});
        let parsed = parse_agent_node(&node);
        assert_eq!(parsed.record.created_at.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn pull_agents_paginates_until_short_page() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let full_page: Vec<Value> = (0..AGENTS_PAGE_SIZE)
            .map(|i| json!({"chainId": 1, "tokenId": i.to_string()}))
            .collect();
        let short_page: Vec<Value> = vec![json!({"chainId": 1, "tokenId": "last"})];

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"agents": full_page}})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"agents": short_page}})))
            .mount(&server)
            .await;

        let client = UpstreamClient::with_endpoint_for_test(format!("{}/graphql", server.uri()));
        let pull = pull_agents(&client).await.unwrap();
        assert_eq!(pull.agents.len(), AGENTS_PAGE_SIZE as usize + 1);
        assert!(!pull.truncated);
    }
}
