//! Canonical agent identity and record (§3 "Agent Record").

use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite identifier `chain_id:token_id`.
///
/// Validation: the chain component must parse as an integer drawn from a
/// known set of chains (checked by the caller against configuration); the
/// token component must be non-empty and alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId {
    chain_id: u64,
    token_id: String,
}

impl AgentId {
    pub fn new(chain_id: u64, token_id: impl Into<String>) -> Result<Self> {
        let token_id = token_id.into();
        if token_id.is_empty() || !token_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GatewayError::Validation(format!(
                "token id must be non-empty alphanumeric, got {token_id:?}"
            )));
        }
        Ok(Self { chain_id, token_id })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// The identifier as it is stored in the vector store (`chain:token` with
    /// `:` replaced by `_` to satisfy point-id constraints, §4.6).
    pub fn to_point_id(&self) -> String {
        format!("{}_{}", self.chain_id, self.token_id)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.token_id)
    }
}

impl std::str::FromStr for AgentId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        let (chain, token) = s.split_once(':').ok_or_else(|| {
            GatewayError::Validation(format!("agent id {s:?} missing ':' separator"))
        })?;
        let chain_id: u64 = chain
            .parse()
            .map_err(|_| GatewayError::Validation(format!("invalid chain id {chain:?}")))?;
        AgentId::new(chain_id, token)
    }
}

impl TryFrom<String> for AgentId {
    type Error = GatewayError;
    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        value.to_string()
    }
}

/// Declared OASF skill/domain slugs without the confidence scoring that
/// resolved `Classification` entries carry — these come straight from the
/// upstream record or the agent's own registration file.
pub type Slug = String;

/// One on-chain agent record as pulled from the authoritative upstream
/// source, merged with whatever enrichment has landed so far.
///
/// All string fields normalize addresses to lowercase. Missing strings
/// serialize as empty string, never null (I6 / payload contract).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub active: bool,

    // Protocol support
    pub has_mcp: bool,
    pub has_a2a: bool,
    pub has_x402: bool,
    pub has_registration_file: bool,

    // Endpoints
    pub mcp_endpoint: String,
    pub a2a_endpoint: String,
    pub oasf_endpoint: String,
    pub email: String,

    // Protocol versions
    pub mcp_version: String,
    pub a2a_version: String,

    // Capability lists (raw, pre-enrichment)
    pub mcp_tools: Vec<String>,
    pub mcp_prompts: Vec<String>,
    pub mcp_resources: Vec<String>,
    pub a2a_skills: Vec<String>,

    // Declared taxonomy
    pub declared_skills: Vec<Slug>,
    pub declared_domains: Vec<Slug>,

    // Identity adornments
    pub ens: String,
    pub did: String,
    pub owner: String,
    pub wallet_address: String,
    pub operator_addresses: Vec<String>,
    pub supported_trust_systems: Vec<String>,
    pub agent_uri: String,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Enrichment
    pub resolved_skills: Vec<ScoredSlug>,
    pub resolved_domains: Vec<ScoredSlug>,
    pub reputation: f64,
    pub trust_score: f64,
    pub reachable_mcp: bool,
    pub reachable_a2a: bool,
    pub last_reachability_check_at: Option<DateTime<Utc>>,
    pub curated_by: Vec<String>,

    // Capability enrichment (from capability fetch)
    pub input_modes: Vec<String>,
    pub output_modes: Vec<String>,
}

/// A taxonomy slug with resolution confidence, used for both skills and
/// domains in the enrichment fields of `AgentRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSlug {
    pub slug: Slug,
    pub confidence: f64,
}

/// Minimum confidence for a skill/domain to be indexed for search (I6).
pub const SEARCH_CONFIDENCE_THRESHOLD: f64 = 0.7;

impl AgentRecord {
    /// Lowercase every address-like field in place, per the payload
    /// contract ("All string fields normalize addresses to lowercase").
    pub fn normalize_addresses(&mut self) {
        self.owner = self.owner.to_lowercase();
        self.wallet_address = self.wallet_address.to_lowercase();
        self.ens = self.ens.to_lowercase();
        for addr in &mut self.operator_addresses {
            *addr = addr.to_lowercase();
        }
        for c in &mut self.curated_by {
            *c = c.to_lowercase();
        }
    }

    /// Skills/domains with confidence at or above the search threshold (I6).
    pub fn indexed_skills(&self) -> Vec<&Slug> {
        self.resolved_skills
            .iter()
            .filter(|s| s.confidence >= SEARCH_CONFIDENCE_THRESHOLD)
            .map(|s| &s.slug)
            .collect()
    }

    pub fn indexed_domains(&self) -> Vec<&Slug> {
        self.resolved_domains
            .iter()
            .filter(|s| s.confidence >= SEARCH_CONFIDENCE_THRESHOLD)
            .map(|s| &s.slug)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_round_trips_through_display_and_parse() {
        let id = AgentId::new(11155111, "1").unwrap();
        assert_eq!(id.to_string(), "11155111:1");
        let parsed: AgentId = "11155111:1".parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn agent_id_rejects_empty_or_non_alphanumeric_token() {
        assert!(AgentId::new(1, "").is_err());
        assert!(AgentId::new(1, "abc-123").is_err());
        assert!(AgentId::new(1, "abc123").is_ok());
    }

    #[test]
    fn agent_id_point_id_replaces_colon() {
        let id = AgentId::new(11155111, "1").unwrap();
        assert_eq!(id.to_point_id(), "11155111_1");
    }

    #[test]
    fn agent_id_parse_rejects_missing_separator() {
        let result: Result<AgentId> = "11155111".parse();
        assert!(result.is_err());
    }

    #[test]
    fn indexed_skills_filters_below_threshold() {
        let mut rec = sample_record();
        rec.resolved_skills = vec![
            ScoredSlug { slug: "nlp".into(), confidence: 0.9 },
            ScoredSlug { slug: "vision".into(), confidence: 0.5 },
        ];
        assert_eq!(rec.indexed_skills(), vec![&"nlp".to_string()]);
    }

    fn sample_record() -> AgentRecord {
        AgentRecord {
            id: AgentId::new(1, "1").unwrap(),
            name: String::new(),
            description: String::new(),
            image_url: String::new(),
            active: true,
            has_mcp: false,
            has_a2a: false,
            has_x402: false,
            has_registration_file: false,
            mcp_endpoint: String::new(),
            a2a_endpoint: String::new(),
            oasf_endpoint: String::new(),
            email: String::new(),
            mcp_version: String::new(),
            a2a_version: String::new(),
            mcp_tools: vec![],
            mcp_prompts: vec![],
            mcp_resources: vec![],
            a2a_skills: vec![],
            declared_skills: vec![],
            declared_domains: vec![],
            ens: String::new(),
            did: String::new(),
            owner: String::new(),
            wallet_address: String::new(),
            operator_addresses: vec![],
            supported_trust_systems: vec![],
            agent_uri: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            resolved_skills: vec![],
            resolved_domains: vec![],
            reputation: 0.0,
            trust_score: 0.0,
            reachable_mcp: false,
            reachable_a2a: false,
            last_reachability_check_at: None,
            curated_by: vec![],
            input_modes: vec![],
            output_modes: vec![],
        }
    }
}
