//! Minimal GraphQL transport for the upstream chain indexer.
//!
//! Grounded on `dashflow-graphql::GraphQLTool::execute`: a bare reqwest POST
//! of `{query, variables}`, parsed into a `data`/`errors` envelope. This
//! crate only ever issues two fixed queries, so there is no `Tool` trait,
//! no custom-header support, and no string/structured input duality — just
//! the request/response/error shapes and the POST-and-decode path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{UpstreamError, UpstreamResult};

/// Reads from the upstream indexer are bounded at 10s (§5).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Thin client bound to one GraphQL endpoint.
pub struct UpstreamClient {
    endpoint: String,
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { endpoint: endpoint.into(), client }
    }

    #[cfg(test)]
    pub fn with_endpoint_for_test(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint)
    }

    /// Execute a query, returning the `data` object on success.
    pub async fn query(&self, query: &str, variables: Value) -> UpstreamResult<Value> {
        let body = GraphQlRequest { query, variables };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| UpstreamError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(UpstreamError::Http { status: status.as_u16(), body: text });
        }

        let parsed: GraphQlResponse =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        if let Some(errors) = parsed.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(UpstreamError::GraphQl(messages.join("; ")));
        }

        parsed.data.ok_or_else(|| UpstreamError::Decode("response had neither data nor errors".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_data_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})))
            .mount(&server)
            .await;

        let client = UpstreamClient::with_endpoint_for_test(format!("{}/graphql", server.uri()));
        let data = client.query("query { ok }", json!({})).await.unwrap();
        assert_eq!(data["ok"], true);
    }

    #[tokio::test]
    async fn surfaces_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "field not found"}]
            })))
            .mount(&server)
            .await;

        let client = UpstreamClient::with_endpoint_for_test(format!("{}/graphql", server.uri()));
        let err = client.query("query { bogus }", json!({})).await.unwrap_err();
        assert!(matches!(err, UpstreamError::GraphQl(_)));
    }

    #[tokio::test]
    async fn surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = UpstreamClient::with_endpoint_for_test(format!("{}/graphql", server.uri()));
        let err = client.query("query { ok }", json!({})).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Http { status: 503, .. }));
    }
}
