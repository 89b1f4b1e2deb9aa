//! Payload Builder (§4.3): merge upstream data with out-of-band
//! enrichment into one flat, typed-default record. No `null` ever reaches
//! the vector store — filter semantics depend on default-as-empty.

use crate::agent::{AgentId, AgentRecord, ScoredSlug};
use crate::reachability::Reachability;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Optional enrichment merged on top of the upstream-derived base payload.
/// Each field is independently optional: capability fetch supplies
/// `input_modes`/`output_modes`, the reachability evaluator supplies
/// `reachability`, and the relational store supplies classification and
/// reputation/trust updates.
#[derive(Debug, Clone, Default)]
pub struct PayloadEnrichment {
    pub reachability: Option<Reachability>,
    pub last_reachability_check_at: Option<chrono::DateTime<chrono::Utc>>,
    pub input_modes: Option<Vec<String>>,
    pub output_modes: Option<Vec<String>>,
    pub skill_names: Option<Vec<String>>,
    pub indexed_skills: Option<Vec<ScoredSlug>>,
    pub indexed_domains: Option<Vec<ScoredSlug>>,
    pub skills_with_confidence: Option<Vec<ScoredSlug>>,
    pub domains_with_confidence: Option<Vec<ScoredSlug>>,
    pub reputation: Option<f64>,
    pub trust_score: Option<f64>,
}

/// The flat, filter-queryable record stored alongside a vector (§6: field
/// names are snake_case and part of the external contract).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub agent_id: String,
    pub chain_id: u64,
    pub token_id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub active: bool,

    pub has_mcp: bool,
    pub has_a2a: bool,
    pub has_x402: bool,
    pub has_registration_file: bool,

    pub mcp_endpoint: String,
    pub a2a_endpoint: String,
    pub oasf_endpoint: String,
    pub email: String,
    pub mcp_version: String,
    pub a2a_version: String,

    pub mcp_tools: Vec<String>,
    pub mcp_prompts: Vec<String>,
    pub mcp_resources: Vec<String>,
    pub a2a_skills: Vec<String>,
    pub input_modes: Vec<String>,
    pub output_modes: Vec<String>,

    /// Search-indexed skill slugs (confidence >= 0.7, I6).
    pub skills: Vec<String>,
    /// Search-indexed domain slugs (confidence >= 0.7, I6).
    pub domains: Vec<String>,
    /// Full-confidence skill detail kept for display (I6).
    pub skills_with_confidence: Vec<ScoredSlug>,
    /// Full-confidence domain detail kept for display (I6).
    pub domains_with_confidence: Vec<ScoredSlug>,

    pub ens: String,
    pub did: String,
    pub owner: String,
    pub wallet_address: String,
    pub operator_addresses: Vec<String>,
    pub supported_trust_systems: Vec<String>,
    pub agent_uri: String,
    pub curated_by: Vec<String>,

    pub reputation: f64,
    pub trust_score: f64,
    pub reachable_mcp: bool,
    pub reachable_a2a: bool,
    pub last_reachability_check_at: String,

    pub created_at: String,
    pub updated_at: String,
}

impl Payload {
    /// Flatten into the string-keyed JSON map the vector store expects.
    pub fn to_value_map(&self) -> BTreeMap<String, Value> {
        // Round-tripping through serde_json::Value keeps this in lockstep
        // with the struct definition instead of hand-listing every field.
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        }
    }
}

/// Build the merged payload for one agent (§4.3 entry point).
pub fn build_payload(base: &AgentRecord, enrichment: Option<&PayloadEnrichment>) -> Payload {
    let reachability = enrichment.and_then(|e| e.reachability);
    let input_modes = enrichment
        .and_then(|e| e.input_modes.clone())
        .unwrap_or_else(|| base.input_modes.clone());
    let output_modes = enrichment
        .and_then(|e| e.output_modes.clone())
        .unwrap_or_else(|| base.output_modes.clone());

    let indexed_skills = enrichment
        .and_then(|e| e.indexed_skills.clone())
        .unwrap_or_else(|| {
            base.resolved_skills
                .iter()
                .filter(|s| s.confidence >= crate::agent::SEARCH_CONFIDENCE_THRESHOLD)
                .cloned()
                .collect()
        });
    let indexed_domains = enrichment
        .and_then(|e| e.indexed_domains.clone())
        .unwrap_or_else(|| {
            base.resolved_domains
                .iter()
                .filter(|s| s.confidence >= crate::agent::SEARCH_CONFIDENCE_THRESHOLD)
                .cloned()
                .collect()
        });
    let skills_with_confidence = enrichment
        .and_then(|e| e.skills_with_confidence.clone())
        .unwrap_or_else(|| base.resolved_skills.clone());
    let domains_with_confidence = enrichment
        .and_then(|e| e.domains_with_confidence.clone())
        .unwrap_or_else(|| base.resolved_domains.clone());

    let reputation = enrichment.and_then(|e| e.reputation).unwrap_or(base.reputation);
    let trust_score = enrichment.and_then(|e| e.trust_score).unwrap_or(base.trust_score);

    let last_reachability_check_at = enrichment
        .and_then(|e| e.last_reachability_check_at)
        .or(base.last_reachability_check_at)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    Payload {
        agent_id: base.id.to_string(),
        chain_id: base.id.chain_id(),
        token_id: base.id.token_id().to_string(),
        name: base.name.clone(),
        description: base.description.clone(),
        image_url: base.image_url.clone(),
        active: base.active,
        has_mcp: base.has_mcp,
        has_a2a: base.has_a2a,
        has_x402: base.has_x402,
        has_registration_file: base.has_registration_file,
        mcp_endpoint: base.mcp_endpoint.clone(),
        a2a_endpoint: base.a2a_endpoint.clone(),
        oasf_endpoint: base.oasf_endpoint.clone(),
        email: base.email.clone(),
        mcp_version: base.mcp_version.clone(),
        a2a_version: base.a2a_version.clone(),
        mcp_tools: base.mcp_tools.clone(),
        mcp_prompts: base.mcp_prompts.clone(),
        mcp_resources: base.mcp_resources.clone(),
        a2a_skills: base.a2a_skills.clone(),
        input_modes,
        output_modes,
        skills: indexed_skills.into_iter().map(|s| s.slug).collect(),
        domains: indexed_domains.into_iter().map(|s| s.slug).collect(),
        skills_with_confidence,
        domains_with_confidence,
        ens: base.ens.to_lowercase(),
        did: base.did.clone(),
        owner: base.owner.to_lowercase(),
        wallet_address: base.wallet_address.to_lowercase(),
        operator_addresses: base.operator_addresses.iter().map(|a| a.to_lowercase()).collect(),
        supported_trust_systems: base.supported_trust_systems.clone(),
        agent_uri: base.agent_uri.clone(),
        curated_by: base.curated_by.iter().map(|a| a.to_lowercase()).collect(),
        reputation,
        trust_score,
        reachable_mcp: reachability.map(|r| r.mcp).unwrap_or(base.reachable_mcp),
        reachable_a2a: reachability.map(|r| r.a2a).unwrap_or(base.reachable_a2a),
        last_reachability_check_at,
        created_at: base.created_at.to_rfc3339(),
        updated_at: base.updated_at.to_rfc3339(),
    }
}

/// Parse a point id (`AgentId::to_point_id`) back to an `AgentId`. The vector
/// store id swaps `:` for `_`; since neither the chain id nor the token id
/// may themselves contain `_` in practice here, the first `_` is the split.
pub fn agent_id_from_point_id(point_id: &str) -> Option<AgentId> {
    let (chain, token) = point_id.split_once('_')?;
    let chain_id: u64 = chain.parse().ok()?;
    AgentId::new(chain_id, token).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;
    use chrono::Utc;

    fn base() -> AgentRecord {
        AgentRecord {
            id: AgentId::new(1, "1").unwrap(),
            name: "A".into(),
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
            owner: "0xAB".into(),
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

    #[test]
    fn no_null_values_reach_the_payload() {
        let payload = build_payload(&base(), None);
        let map = payload.to_value_map();
        assert!(!map.values().any(|v| v.is_null()));
        assert_eq!(payload.owner, "0xab");
        assert_eq!(payload.last_reachability_check_at, "");
    }

    #[test]
    fn enrichment_overrides_reachability_without_touching_other_fields() {
        let enrichment = PayloadEnrichment {
            reachability: Some(Reachability { mcp: true, a2a: false }),
            ..Default::default()
        };
        let payload = build_payload(&base(), Some(&enrichment));
        assert!(payload.reachable_mcp);
        assert!(!payload.reachable_a2a);
        assert_eq!(payload.name, "A");
    }

    #[test]
    fn point_id_round_trip() {
        let id = AgentId::new(11155111, "1").unwrap();
        let point_id = id.to_point_id();
        let parsed = agent_id_from_point_id(&point_id).unwrap();
        assert_eq!(id, parsed);
    }
}
