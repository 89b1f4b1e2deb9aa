//! Environment-driven configuration (§4.0.2), grounded on
//! `registry_server.rs`'s `EnvConfig::from_env`: a plain struct populated
//! by reading `std::env::var` with typed defaults, no config-file crate.

use std::collections::HashMap;
use std::net::SocketAddr;

const CHAIN_RPC_PREFIX: &str = "CHAIN_RPC_URL_";
const RATE_LIMIT_TIER_PREFIX: &str = "RATE_LIMIT_RPM_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingRequired(&'static str),
    #[error("at least one CHAIN_RPC_URL_<chain_id> must be set")]
    NoChainsConfigured,
    #[error("invalid GATEWAY_HOST/GATEWAY_PORT: {0}")]
    InvalidBindAddr(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upstream_graphql_url: String,
    pub database_url: String,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub embedding_api_key: String,
    pub embedding_fallback_api_key: Option<String>,
    /// chain id -> RPC URL, one entry per `CHAIN_RPC_URL_<chain_id>` (§4.0.2).
    pub chain_rpc_urls: HashMap<String, String>,
    pub hyde_enabled: bool,
    pub hyde_model: String,
    pub reranker_enabled: bool,
    pub reranker_url: Option<String>,
    pub classification_llm_key: Option<String>,
    pub gateway_host: String,
    pub gateway_port: u16,
    pub rate_limit_rpm_default: u32,
    /// tier name -> requests per minute, from `RATE_LIMIT_RPM_<TIER>`
    /// overrides other than the bare `RATE_LIMIT_RPM_DEFAULT` key.
    pub rate_limit_rpm_tiers: HashMap<String, u32>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let chain_rpc_urls = collect_prefixed(CHAIN_RPC_PREFIX);
        if chain_rpc_urls.is_empty() {
            return Err(ConfigError::NoChainsConfigured);
        }

        let rate_limit_rpm_tiers = collect_prefixed(RATE_LIMIT_TIER_PREFIX)
            .into_iter()
            .filter(|(k, _)| k != "DEFAULT")
            .filter_map(|(k, v)| v.parse().ok().map(|rpm| (k, rpm)))
            .collect();

        Ok(Self {
            upstream_graphql_url: required("UPSTREAM_GRAPHQL_URL")?,
            database_url: required("DATABASE_URL")?,
            qdrant_url: required("QDRANT_URL")?,
            qdrant_collection: required("QDRANT_COLLECTION")?,
            embedding_api_key: required("EMBEDDING_API_KEY")?,
            embedding_fallback_api_key: optional("EMBEDDING_FALLBACK_API_KEY"),
            chain_rpc_urls,
            hyde_enabled: optional("HYDE_ENABLED").map(|v| v != "false" && v != "0").unwrap_or(true),
            hyde_model: optional("HYDE_MODEL").unwrap_or_else(|| "hyde-mini".to_string()),
            reranker_enabled: optional("RERANKER_ENABLED").map(|v| v == "true" || v == "1").unwrap_or(false),
            reranker_url: optional("RERANKER_URL"),
            classification_llm_key: optional("CLASSIFICATION_LLM_KEY"),
            gateway_host: optional("GATEWAY_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            gateway_port: optional("GATEWAY_PORT").and_then(|p| p.parse().ok()).unwrap_or(8080),
            rate_limit_rpm_default: optional("RATE_LIMIT_RPM_DEFAULT").and_then(|r| r.parse().ok()).unwrap_or(60),
            rate_limit_rpm_tiers,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.gateway_host, self.gateway_port)
            .parse()
            .map_err(|e| ConfigError::InvalidBindAddr(format!("{e}")))
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.gateway_host, self.gateway_port)
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingRequired(key))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Collects every `PREFIX<suffix>=value` environment variable into a
/// `suffix -> value` map (§4.0.2's `CHAIN_RPC_URL_<chain_id>` /
/// `RATE_LIMIT_RPM_<TIER>` shape).
fn collect_prefixed(prefix: &str) -> HashMap<String, String> {
    std::env::vars().filter_map(|(k, v)| k.strip_prefix(prefix).map(|suffix| (suffix.to_string(), v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_prefixed_strips_the_prefix() {
        std::env::set_var("CHAIN_RPC_URL_1", "https://rpc.example/1");
        let chains = collect_prefixed(CHAIN_RPC_PREFIX);
        assert_eq!(chains.get("1").map(String::as_str), Some("https://rpc.example/1"));
        std::env::remove_var("CHAIN_RPC_URL_1");
    }

    #[test]
    fn rate_limit_default_key_is_excluded_from_tier_map() {
        std::env::set_var("RATE_LIMIT_RPM_DEFAULT", "60");
        std::env::set_var("RATE_LIMIT_RPM_TRUSTED", "600");
        let tiers: HashMap<String, u32> = collect_prefixed(RATE_LIMIT_TIER_PREFIX)
            .into_iter()
            .filter(|(k, _)| k != "DEFAULT")
            .filter_map(|(k, v)| v.parse().ok().map(|rpm| (k, rpm)))
            .collect();
        assert_eq!(tiers.get("TRUSTED"), Some(&600));
        assert!(!tiers.contains_key("DEFAULT"));
        std::env::remove_var("RATE_LIMIT_RPM_DEFAULT");
        std::env::remove_var("RATE_LIMIT_RPM_TRUSTED");
    }
}
