//! Filter Compiler (§4.1): translate a flat structured filter request into
//! a store-agnostic boolean expression tree. `gateway-vector` is
//! responsible for turning the tree this module emits into the vector
//! store's native filter representation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How multiple boolean protocol filters (mcp/a2a/x402) compose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterMode {
    #[default]
    And,
    Or,
}

/// A leaf predicate in the compiled filter tree (§4.1 predicate table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Predicate {
    /// `key match value v`.
    MatchValue { key: String, value: Value },
    /// `key match any [v...]`.
    MatchAny { key: String, values: Vec<Value> },
    /// `key range {gte?, lte?, gt?, lt?}`.
    Range {
        key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        gte: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lte: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gt: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lt: Option<Value>,
    },
    /// `key values_count {gte?, lte?}`.
    ValuesCount {
        key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        gte: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lte: Option<u64>,
    },
}

impl Predicate {
    fn match_value(key: &str, value: impl Into<Value>) -> Predicate {
        Predicate::MatchValue { key: key.to_string(), value: value.into() }
    }

    fn non_empty_string(key: &str) -> Predicate {
        Predicate::match_value(key, "")
    }
}

/// The compiled filter tree: `must` (AND), `should` (OR), `must_not` (NAND).
/// `min_should_match` is set when `should` must contribute at least one
/// match because `must` is otherwise empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterTree {
    pub must: Vec<Predicate>,
    pub should: Vec<Predicate>,
    pub must_not: Vec<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_should_match: Option<u32>,
}

impl FilterTree {
    fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }
}

/// The ~40 recognized filter keys, one optional field each. `None` means
/// "not specified"; specifying `Some(false)` for a boolean is distinct from
/// not specifying it at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredFilter {
    // Boolean protocol filters, composed via `filter_mode`.
    pub mcp: Option<bool>,
    pub a2a: Option<bool>,
    pub x402: Option<bool>,
    #[serde(default)]
    pub filter_mode: FilterMode,

    pub active: Option<bool>,
    pub reachable_mcp: Option<bool>,
    pub reachable_a2a: Option<bool>,

    pub chain_id: Option<u64>,
    pub chain_ids: Option<Vec<u64>>,

    // Identifier-like keys: lowercased before comparison.
    pub owner: Option<String>,
    pub ens: Option<String>,
    pub curated_by: Option<String>,
    pub operator: Option<String>,

    pub min_rep: Option<f64>,
    pub max_rep: Option<f64>,
    pub min_trust: Option<f64>,
    pub max_trust: Option<f64>,

    pub skills: Option<Vec<String>>,
    pub domains: Option<Vec<String>>,

    // "Has field" (non-empty string) toggles.
    pub has_mcp_endpoint: Option<bool>,
    pub has_a2a_endpoint: Option<bool>,
    pub has_oasf_endpoint: Option<bool>,
    pub has_email: Option<bool>,
    pub has_ens: Option<bool>,
    pub has_did: Option<bool>,
    pub has_wallet_address: Option<bool>,
    pub has_agent_uri: Option<bool>,

    // "Has items" (array) toggles, compiled to `values_count`.
    pub has_skills: Option<bool>,
    pub has_domains: Option<bool>,
    pub has_operators: Option<bool>,
    pub has_trust_systems: Option<bool>,
    pub has_curated_by: Option<bool>,

    pub min_skills_count: Option<u64>,
    pub max_skills_count: Option<u64>,
    pub min_domains_count: Option<u64>,
    pub max_domains_count: Option<u64>,

    // Numeric count fields (not arrays): compiled to `range`, not `values_count`.
    pub min_total_validations: Option<u64>,
    pub max_total_validations: Option<u64>,
    pub min_pending_validations: Option<u64>,
    pub max_pending_validations: Option<u64>,
    pub min_expired_validations: Option<u64>,
    pub max_expired_validations: Option<u64>,

    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,

    /// `hasRecentReachability` ⇒ `last_reachability_check_at` within 14 days.
    pub has_recent_reachability: Option<bool>,
}

const RECENT_REACHABILITY_WINDOW_DAYS: i64 = 14;

/// Compile a structured filter into a `FilterTree`, or `None` for the "no
/// filter" sentinel (an empty filter must never produce an empty object).
pub fn compile(filter: &StructuredFilter, now: DateTime<Utc>) -> Option<FilterTree> {
    let mut must = Vec::new();
    let mut should = Vec::new();
    let mut must_not = Vec::new();

    compile_protocol_booleans(filter, &mut must, &mut should);

    if let Some(v) = filter.active {
        must.push(Predicate::match_value("active", v));
    }
    if let Some(v) = filter.reachable_mcp {
        must.push(Predicate::match_value("reachable_mcp", v));
    }
    if let Some(v) = filter.reachable_a2a {
        must.push(Predicate::match_value("reachable_a2a", v));
    }
    if let Some(v) = filter.chain_id {
        must.push(Predicate::match_value("chain_id", v));
    }
    if let Some(ref v) = filter.chain_ids {
        must.push(Predicate::MatchAny {
            key: "chain_id".to_string(),
            values: v.iter().map(|c| Value::from(*c)).collect(),
        });
    }

    compile_lowercased_identifier(&mut must, "owner", &filter.owner);
    compile_lowercased_identifier(&mut must, "ens", &filter.ens);
    compile_lowercased_identifier(&mut must, "curated_by", &filter.curated_by);
    compile_lowercased_identifier(&mut must, "operator_addresses", &filter.operator);

    compile_range_f64(&mut must, "reputation", filter.min_rep, filter.max_rep);
    compile_range_f64(&mut must, "trust_score", filter.min_trust, filter.max_trust);

    if let Some(ref v) = filter.skills {
        must.push(Predicate::MatchAny {
            key: "skills".to_string(),
            values: v.iter().map(|s| Value::from(s.clone())).collect(),
        });
    }
    if let Some(ref v) = filter.domains {
        must.push(Predicate::MatchAny {
            key: "domains".to_string(),
            values: v.iter().map(|s| Value::from(s.clone())).collect(),
        });
    }

    compile_has_field(&mut must, &mut must_not, "mcp_endpoint", filter.has_mcp_endpoint);
    compile_has_field(&mut must, &mut must_not, "a2a_endpoint", filter.has_a2a_endpoint);
    compile_has_field(&mut must, &mut must_not, "oasf_endpoint", filter.has_oasf_endpoint);
    compile_has_field(&mut must, &mut must_not, "email", filter.has_email);
    compile_has_field(&mut must, &mut must_not, "ens", filter.has_ens);
    compile_has_field(&mut must, &mut must_not, "did", filter.has_did);
    compile_has_field(&mut must, &mut must_not, "wallet_address", filter.has_wallet_address);
    compile_has_field(&mut must, &mut must_not, "agent_uri", filter.has_agent_uri);

    compile_has_items(&mut must, "skills", filter.has_skills);
    compile_has_items(&mut must, "domains", filter.has_domains);
    compile_has_items(&mut must, "operator_addresses", filter.has_operators);
    compile_has_items(&mut must, "supported_trust_systems", filter.has_trust_systems);
    compile_has_items(&mut must, "curated_by", filter.has_curated_by);

    compile_values_count(&mut must, "skills", filter.min_skills_count, filter.max_skills_count);
    compile_values_count(&mut must, "domains", filter.min_domains_count, filter.max_domains_count);

    compile_range_u64(
        &mut must,
        "total_validations",
        filter.min_total_validations,
        filter.max_total_validations,
    );
    compile_range_u64(
        &mut must,
        "pending_validations",
        filter.min_pending_validations,
        filter.max_pending_validations,
    );
    compile_range_u64(
        &mut must,
        "expired_validations",
        filter.min_expired_validations,
        filter.max_expired_validations,
    );

    compile_datetime_range(&mut must, "created_at", filter.created_after, filter.created_before);
    compile_datetime_range(&mut must, "updated_at", filter.updated_after, filter.updated_before);

    if let Some(recent) = filter.has_recent_reachability {
        let cutoff = (now - Duration::days(RECENT_REACHABILITY_WINDOW_DAYS)).to_rfc3339();
        let predicate = Predicate::Range {
            key: "last_reachability_check_at".to_string(),
            gte: Some(Value::from(cutoff.clone())),
            lte: None,
            gt: None,
            lt: None,
        };
        if recent {
            must.push(predicate);
        } else {
            must_not.push(predicate);
        }
    }

    let min_should_match = if must.is_empty() && !should.is_empty() { Some(1) } else { None };

    let tree = FilterTree { must, should, must_not, min_should_match };
    if tree.is_empty() {
        None
    } else {
        Some(tree)
    }
}

fn compile_protocol_booleans(
    filter: &StructuredFilter,
    must: &mut Vec<Predicate>,
    should: &mut Vec<Predicate>,
) {
    let booleans: Vec<(&str, bool)> = [
        ("has_mcp", filter.mcp),
        ("has_a2a", filter.a2a),
        ("has_x402", filter.x402),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.map(|v| (k, v)))
    .collect();

    if booleans.is_empty() {
        return;
    }

    let use_should = filter.filter_mode == FilterMode::Or && booleans.len() >= 2;
    let target = if use_should { should } else { must };
    for (key, value) in booleans {
        target.push(Predicate::match_value(key, value));
    }
}

fn compile_lowercased_identifier(must: &mut Vec<Predicate>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        must.push(Predicate::match_value(key, v.to_lowercase()));
    }
}

fn compile_range_f64(must: &mut Vec<Predicate>, key: &str, min: Option<f64>, max: Option<f64>) {
    if min.is_none() && max.is_none() {
        return;
    }
    must.push(Predicate::Range {
        key: key.to_string(),
        gte: min.map(Value::from),
        lte: max.map(Value::from),
        gt: None,
        lt: None,
    });
}

fn compile_range_u64(must: &mut Vec<Predicate>, key: &str, min: Option<u64>, max: Option<u64>) {
    if min.is_none() && max.is_none() {
        return;
    }
    must.push(Predicate::Range {
        key: key.to_string(),
        gte: min.map(Value::from),
        lte: max.map(Value::from),
        gt: None,
        lt: None,
    });
}

fn compile_datetime_range(
    must: &mut Vec<Predicate>,
    key: &str,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
) {
    if after.is_none() && before.is_none() {
        return;
    }
    must.push(Predicate::Range {
        key: key.to_string(),
        gte: after.map(|t| Value::from(t.to_rfc3339())),
        lte: before.map(|t| Value::from(t.to_rfc3339())),
        gt: None,
        lt: None,
    });
}

fn compile_has_field(
    must: &mut Vec<Predicate>,
    must_not: &mut Vec<Predicate>,
    key: &str,
    has: Option<bool>,
) {
    match has {
        Some(true) => must_not.push(Predicate::non_empty_string(key)),
        Some(false) => must.push(Predicate::non_empty_string(key)),
        None => {}
    }
}

fn compile_has_items(must: &mut Vec<Predicate>, key: &str, has: Option<bool>) {
    match has {
        Some(true) => must.push(Predicate::ValuesCount { key: key.to_string(), gte: Some(1), lte: None }),
        Some(false) => must.push(Predicate::ValuesCount { key: key.to_string(), gte: None, lte: Some(0) }),
        None => {}
    }
}

fn compile_values_count(must: &mut Vec<Predicate>, key: &str, min: Option<u64>, max: Option<u64>) {
    if min.is_none() && max.is_none() {
        return;
    }
    must.push(Predicate::ValuesCount { key: key.to_string(), gte: min, lte: max });
}
