//! Deterministic content hashing over canonicalized field sets (§4.2).
//!
//! Two disjoint hashes are computed per agent: `embed_hash` over the fields
//! that influence the vector, and `content_hash` over the payload-only
//! fields. Canonicalization (sorted keys, lowercased addresses, sorted
//! deduplicated arrays for set-like fields, no `null`s) is part of the
//! contract so that two implementations of this module, given equivalent
//! inputs, hash byte-identical input.

use crate::agent::AgentRecord;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

/// Canonicalize a JSON value: sort object keys recursively. Arrays are left
/// in place except where the caller has already sorted set-like fields
/// before constructing the value (callers in this module do that).
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                // undefined/null fields are omitted entirely, not hashed as null.
                if let Some(v) = map.get(key) {
                    if v.is_null() {
                        continue;
                    }
                    sorted.insert(key.clone(), canonicalize(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn sha256_hex(canonical: &Value) -> String {
    // `serde_json::to_vec` on a `Value::Object` built from a sorted `Map`
    // preserves insertion order, which is the sort order we established in
    // `canonicalize` — this is what makes the hash input byte-identical
    // across implementations.
    let bytes = serde_json::to_vec(canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

fn sorted_unique(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items
}

/// `EmbedFields` = {name, description, mcp_tools, mcp_prompts, mcp_resources,
/// a2a_skills, input_modes, output_modes}.
pub fn embed_hash(agent: &AgentRecord) -> String {
    let value = json!({
        "name": agent.name,
        "description": agent.description,
        "mcp_tools": sorted_unique(agent.mcp_tools.clone()),
        "mcp_prompts": sorted_unique(agent.mcp_prompts.clone()),
        "mcp_resources": sorted_unique(agent.mcp_resources.clone()),
        "a2a_skills": sorted_unique(agent.a2a_skills.clone()),
        "input_modes": sorted_unique(agent.input_modes.clone()),
        "output_modes": sorted_unique(agent.output_modes.clone()),
    });
    sha256_hex(&canonicalize(&value))
}

/// `ContentFields` = {agent_id, name, description, active, has_mcp, has_a2a,
/// skills, domains, reputation, owner, has_registration_file}.
pub fn content_hash(agent: &AgentRecord) -> String {
    let skills = sorted_unique(agent.indexed_skills().into_iter().cloned().collect());
    let domains = sorted_unique(agent.indexed_domains().into_iter().cloned().collect());

    let value = json!({
        "agent_id": agent.id.to_string(),
        "name": agent.name,
        "description": agent.description,
        "active": agent.active,
        "has_mcp": agent.has_mcp,
        "has_a2a": agent.has_a2a,
        "skills": skills,
        "domains": domains,
        "reputation": agent.reputation,
        "owner": agent.owner.to_lowercase(),
        "has_registration_file": agent.has_registration_file,
    });
    sha256_hex(&canonicalize(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentId, ScoredSlug};
    use chrono::Utc;

    fn sample() -> AgentRecord {
        AgentRecord {
            id: AgentId::new(11155111, "1").unwrap(),
            name: "Echo Agent".into(),
            description: "Echoes input".into(),
            image_url: String::new(),
            active: true,
            has_mcp: true,
            has_a2a: false,
            has_x402: false,
            has_registration_file: true,
            mcp_endpoint: String::new(),
            a2a_endpoint: String::new(),
            oasf_endpoint: String::new(),
            email: String::new(),
            mcp_version: String::new(),
            a2a_version: String::new(),
            mcp_tools: vec!["search".into(), "echo".into()],
            mcp_prompts: vec![],
            mcp_resources: vec![],
            a2a_skills: vec![],
            declared_skills: vec![],
            declared_domains: vec![],
            ens: String::new(),
            did: String::new(),
            owner: "0xAA".into(),
            wallet_address: String::new(),
            operator_addresses: vec![],
            supported_trust_systems: vec![],
            agent_uri: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            resolved_skills: vec![ScoredSlug { slug: "nlp".into(), confidence: 0.95 }],
            resolved_domains: vec![],
            reputation: 88.0,
            trust_score: 0.0,
            reachable_mcp: false,
            reachable_a2a: false,
            last_reachability_check_at: None,
            curated_by: vec![],
            input_modes: vec!["text".into()],
            output_modes: vec!["text".into()],
        }
    }

    #[test]
    fn property_p3_embed_hash_stable_under_list_reorder() {
        let mut a = sample();
        let mut b = sample();
        b.mcp_tools = vec!["echo".into(), "search".into()]; // reordered
        assert_eq!(embed_hash(&a), embed_hash(&b));

        a.mcp_tools.push("search".into()); // duplicate, should not change hash
        assert_eq!(embed_hash(&a), embed_hash(&sample()));
    }

    #[test]
    fn embed_hash_changes_when_description_changes() {
        let a = sample();
        let mut b = sample();
        b.description = "Something else entirely".into();
        assert_ne!(embed_hash(&a), embed_hash(&b));
    }

    #[test]
    fn content_hash_lowercases_owner() {
        let mut a = sample();
        let mut b = sample();
        b.owner = "0xaa".into();
        assert_eq!(content_hash(&a), content_hash(&b));

        a.owner = "0xBB".into();
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_hash_excludes_low_confidence_skills() {
        let mut a = sample();
        a.resolved_skills.push(ScoredSlug { slug: "vision".into(), confidence: 0.3 });
        assert_eq!(content_hash(&a), content_hash(&sample()));
    }

    #[test]
    fn embed_hash_and_content_hash_are_disjoint_concerns() {
        let mut a = sample();
        a.reputation = 10.0; // content field only
        assert_eq!(embed_hash(&a), embed_hash(&sample()));
        assert_ne!(content_hash(&a), content_hash(&sample()));
    }
}
