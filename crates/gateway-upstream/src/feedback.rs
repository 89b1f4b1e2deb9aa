//! The `feedbacks` query (§6, §4.12): paginated pull of feedback events
//! created after a watermark, skipping revoked entries.

use chrono::{DateTime, TimeZone, Utc};
use gateway_core::agent::AgentId;
use gateway_core::feedback::FeedbackEvent;
use serde_json::{json, Value};

use crate::client::UpstreamClient;
use crate::error::UpstreamResult;
use crate::lenient::{str_field, ParseWarning};

/// Page size for the `feedbacks` query (§4.12).
pub const FEEDBACK_PAGE_SIZE: u32 = 1000;

/// Total records pulled across all pages in one feedback-sync run.
pub const FEEDBACK_SAFETY_CAP: usize = 50_000;

const FEEDBACK_QUERY: &str = r#"
query Feedbacks($first: Int!, $skip: Int!, $createdAtGt: Int!) {
  feedbacks(
    first: $first
    skip: $skip
    orderBy: createdAt
    orderDirection: asc
    where: { createdAt_gt: $createdAtGt, isRevoked: false }
  ) {
    id
    chainId
    tokenId
    score
    tag1
    tag2
    context
    uri
    submitterAddress
    createdAt
    transactionHash
    isRevoked
  }
}
"#;

/// One feedback node, parsed to an event unless it was revoked or
/// structurally invalid (in which case `event` is `None`).
pub struct ParsedFeedback {
    pub event: Option<FeedbackEvent>,
    pub warnings: Vec<ParseWarning>,
}

/// Outcome of a full paginated pull, bounded by [`FEEDBACK_SAFETY_CAP`].
pub struct FeedbackPull {
    pub feedback: Vec<ParsedFeedback>,
    /// True if the safety cap was hit before the upstream ran out of pages.
    pub truncated: bool,
}

/// Pull every feedback event created strictly after `since`, paginating at
/// [`FEEDBACK_PAGE_SIZE`] per request until either the upstream returns a
/// short page or [`FEEDBACK_SAFETY_CAP`] total records have been pulled.
///
/// Revoked entries are excluded by the query's `where` clause already;
/// [`parse_feedback_node`] re-checks `isRevoked` at parse time in case an
/// upstream implementation ignores the predicate.
pub async fn pull_feedback(client: &UpstreamClient, since: DateTime<Utc>) -> UpstreamResult<FeedbackPull> {
    let mut feedback = Vec::new();
    let mut skip: u32 = 0;
    let mut truncated = false;

    loop {
        let remaining_budget = FEEDBACK_SAFETY_CAP.saturating_sub(feedback.len());
        if remaining_budget == 0 {
            truncated = true;
            break;
        }
        let first = FEEDBACK_PAGE_SIZE.min(remaining_budget as u32);

        let data = client
            .query(
                FEEDBACK_QUERY,
                json!({"first": first, "skip": skip, "createdAtGt": since.timestamp()}),
            )
            .await?;

        let nodes = data.get("feedbacks").and_then(Value::as_array).cloned().unwrap_or_default();
        let page_len = nodes.len();

        for node in nodes {
            feedback.push(parse_feedback_node(&node));
        }

        if page_len < first as usize {
            break;
        }
        skip += first;
    }

    Ok(FeedbackPull { feedback, truncated })
}

fn parse_feedback_node(node: &Value) -> ParsedFeedback {
    let mut warnings = Vec::new();

    if node.get("isRevoked").and_then(Value::as_bool).unwrap_or(false) {
        return ParsedFeedback { event: None, warnings };
    }

    let raw_id = str_field(node, "id");
    if raw_id.is_empty() {
        warnings.push(ParseWarning { field: "id".into(), message: "missing external id, dropping entry".into() });
        return ParsedFeedback { event: None, warnings };
    }

    let chain_id = node.get("chainId").and_then(Value::as_u64).unwrap_or_else(|| {
        warnings.push(ParseWarning { field: "chainId".into(), message: "missing or non-numeric, defaulting to 0".into() });
        0
    });
    let token_id = str_field(node, "tokenId");
    let agent_id = match AgentId::new(chain_id, &token_id) {
        Ok(id) => id,
        Err(e) => {
            warnings.push(ParseWarning { field: "tokenId".into(), message: e.to_string() });
            return ParsedFeedback { event: None, warnings };
        }
    };

    let score = match node.get("score").and_then(Value::as_u64) {
        Some(s) if s <= 100 => s as u8,
        Some(s) => {
            warnings.push(ParseWarning { field: "score".into(), message: format!("{s} out of range, dropping entry") });
            return ParsedFeedback { event: None, warnings };
        }
        None => {
            warnings.push(ParseWarning { field: "score".into(), message: "missing or non-numeric, dropping entry".into() });
            return ParsedFeedback { event: None, warnings };
        }
    };

    let tags: Vec<String> =
        [str_field(node, "tag1"), str_field(node, "tag2")].into_iter().filter(|t| !t.is_empty()).collect();

    let created_at = parse_timestamp(node.get("createdAt"), &mut warnings);
    let submitter = str_field(node, "submitterAddress");
    let transaction_hash = str_field(node, "transactionHash");

    let mut event = match FeedbackEvent::new(
        FeedbackEvent::graph_external_id(&raw_id),
        agent_id,
        chain_id,
        score,
        tags,
        submitter,
        created_at,
        transaction_hash,
    ) {
        Ok(event) => event,
        Err(e) => {
            warnings.push(ParseWarning { field: "score".into(), message: e.to_string() });
            return ParsedFeedback { event: None, warnings };
        }
    };

    let context = node.get("context").and_then(Value::as_str).map(str::to_string).filter(|s| !s.is_empty());
    let uri = node.get("uri").and_then(Value::as_str).map(str::to_string).filter(|s| !s.is_empty());
    event.context = context;
    event.uri = uri;

    ParsedFeedback { event: Some(event), warnings }
}

fn parse_timestamp(value: Option<&Value>, warnings: &mut Vec<ParseWarning>) -> DateTime<Utc> {
    match value {
        Some(Value::Number(n)) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()).unwrap_or_else(|| {
            warnings.push(ParseWarning { field: "createdAt".into(), message: "numeric timestamp out of range".into() });
            Utc.timestamp_opt(0, 0).single().unwrap_or_default()
        }),
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                warnings.push(ParseWarning { field: "createdAt".into(), message: format!("{e}, defaulting to epoch") });
                Utc.timestamp_opt(0, 0).single().unwrap_or_default()
            }
        },
        _ => {
            warnings.push(ParseWarning { field: "createdAt".into(), message: "missing, defaulting to epoch".into() });
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
            "id": "99",
            "chainId": 1,
            "tokenId": "7",
            "score": 85,
            "tag1": "reachability_mcp",
            "tag2": "",
            "submitterAddress": "0xABC",
            "createdAt": 1_700_000_000,
            "transactionHash": "0xdead",
            "isRevoked": false
        });
        let parsed = parse_feedback_node(&node);
        assert!(parsed.warnings.is_empty());
        let event = parsed.event.unwrap();
        assert_eq!(event.external_id, "graph:99");
        assert_eq!(event.score, 85);
        assert_eq!(event.tags, vec!["reachability_mcp".to_string()]);
        assert_eq!(event.submitter_address, "0xabc");
    }

    #[test]
    fn drops_revoked_entries() {
        let node = json!({"id": "1", "chainId": 1, "tokenId": "7", "score": 50, "isRevoked": true});
        let parsed = parse_feedback_node(&node);
        assert!(parsed.event.is_none());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn drops_out_of_range_score_with_warning() {
        let node = json!({"id": "1", "chainId": 1, "tokenId": "7", "score": 250});
        let parsed = parse_feedback_node(&node);
        assert!(parsed.event.is_none());
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[tokio::test]
    async fn pull_feedback_paginates_until_short_page() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let full_page: Vec<Value> = (0..FEEDBACK_PAGE_SIZE)
            .map(|i| json!({"id": i.to_string(), "chainId": 1, "tokenId": "7", "score": 50, "createdAt": 1_700_000_000}))
            .collect();
        let short_page: Vec<Value> =
            vec![json!({"id": "last", "chainId": 1, "tokenId": "7", "score": 50, "createdAt": 1_700_000_000})];

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"feedbacks": full_page}})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"feedbacks": short_page}})))
            .mount(&server)
            .await;

        let client = UpstreamClient::with_endpoint_for_test(format!("{}/graphql", server.uri()));
        let pull = pull_feedback(&client, Utc.timestamp_opt(0, 0).single().unwrap()).await.unwrap();
        assert_eq!(pull.feedback.len(), FEEDBACK_PAGE_SIZE as usize + 1);
        assert!(!pull.truncated);
    }
}
