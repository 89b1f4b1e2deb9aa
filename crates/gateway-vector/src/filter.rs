//! Translates a [`gateway_core::FilterTree`] into Qdrant's native `Filter`
//! message. Grounded on the teacher's `hashmap_to_qdrant_filter` helper,
//! extended here to cover range, match-any, and values-count predicates
//! that the teacher's own filter only needed for equality matches.

use chrono::DateTime;
use gateway_core::filter::Predicate;
use gateway_core::FilterTree;
use qdrant_client::qdrant::condition::ConditionOneOf;
use qdrant_client::qdrant::r#match::MatchValue;
use qdrant_client::qdrant::{Condition, FieldCondition, Filter, Match, Range, ValuesCount};
use serde_json::Value;

pub fn to_qdrant_filter(tree: &FilterTree) -> Filter {
    Filter {
        must: tree.must.iter().map(predicate_to_condition).collect(),
        should: tree.should.iter().map(predicate_to_condition).collect(),
        must_not: tree.must_not.iter().map(predicate_to_condition).collect(),
        // `min_should.conditions` is evaluated independently of the
        // top-level `should` list, so populating it here would ignore the
        // real conditions. `compile()` only ever needs `min_should_match=1`
        // for a non-empty `should`, which Qdrant already requires by
        // default when `must` is empty.
        min_should: None,
    }
}

fn predicate_to_condition(predicate: &Predicate) -> Condition {
    let field = match predicate {
        Predicate::MatchValue { key, value } => FieldCondition {
            key: key.clone(),
            r#match: match_value_condition(value),
            ..Default::default()
        },
        Predicate::MatchAny { key, values } => {
            FieldCondition { key: key.clone(), r#match: match_any_condition(values), ..Default::default() }
        }
        Predicate::Range { key, gte, lte, gt, lt } => FieldCondition {
            key: key.clone(),
            range: Some(Range {
                gte: gte.as_ref().and_then(value_to_f64),
                lte: lte.as_ref().and_then(value_to_f64),
                gt: gt.as_ref().and_then(value_to_f64),
                lt: lt.as_ref().and_then(value_to_f64),
            }),
            ..Default::default()
        },
        Predicate::ValuesCount { key, gte, lte } => FieldCondition {
            key: key.clone(),
            values_count: Some(ValuesCount { gte: *gte, lte: *lte, gt: None, lt: None }),
            ..Default::default()
        },
    };

    Condition { condition_one_of: Some(ConditionOneOf::Field(field)) }
}

fn match_value_condition(value: &Value) -> Option<Match> {
    let match_value = match value {
        Value::String(s) => Some(MatchValue::Keyword(s.clone())),
        Value::Bool(b) => Some(MatchValue::Boolean(*b)),
        Value::Number(n) => n.as_i64().map(MatchValue::Integer),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    match_value.map(|mv| Match { match_value: Some(mv) })
}

fn match_any_condition(values: &[Value]) -> Option<Match> {
    if values.is_empty() {
        return None;
    }
    if values.iter().all(|v| v.is_string()) {
        let strings = values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        return Some(Match {
            match_value: Some(MatchValue::Keywords(qdrant_client::qdrant::RepeatedStrings { strings })),
        });
    }
    if values.iter().all(|v| v.is_number()) {
        let integers = values.iter().filter_map(|v| v.as_i64()).collect();
        return Some(Match {
            match_value: Some(MatchValue::Integers(qdrant_client::qdrant::RepeatedIntegers { integers })),
        });
    }
    None
}

/// A `Range` predicate may carry either a numeric value or an RFC3339
/// timestamp string (§4.1 treats both as "range comparable"). Qdrant's
/// range condition only compares numbers, so timestamp strings are
/// converted to a Unix-epoch-seconds float, relying on field values being
/// indexed the same way at write time (`hash.rs`/`payload.rs` always emit
/// RFC3339, so comparisons stay consistent across both sides).
fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.timestamp() as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::filter::{compile, StructuredFilter};

    #[test]
    fn match_value_round_trips_into_field_condition() {
        let filter = StructuredFilter { active: Some(true), ..Default::default() };
        let tree = compile(&filter, chrono::Utc::now()).unwrap();
        let qdrant_filter = to_qdrant_filter(&tree);
        assert_eq!(qdrant_filter.must.len(), 1);
        match &qdrant_filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => {
                assert_eq!(field.key, "active");
                assert!(matches!(field.r#match.as_ref().unwrap().match_value, Some(MatchValue::Boolean(true))));
            }
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn range_predicate_carries_numeric_bounds() {
        let filter = StructuredFilter { min_rep: Some(50.0), max_rep: Some(90.0), ..Default::default() };
        let tree = compile(&filter, chrono::Utc::now()).unwrap();
        let qdrant_filter = to_qdrant_filter(&tree);
        match &qdrant_filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => {
                let range = field.range.as_ref().unwrap();
                assert_eq!(range.gte, Some(50.0));
                assert_eq!(range.lte, Some(90.0));
            }
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn match_any_on_skills_becomes_keywords() {
        let filter = StructuredFilter {
            skills: Some(vec!["web-search".to_string(), "coding".to_string()]),
            ..Default::default()
        };
        let tree = compile(&filter, chrono::Utc::now()).unwrap();
        let qdrant_filter = to_qdrant_filter(&tree);
        match &qdrant_filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => {
                assert!(matches!(field.r#match.as_ref().unwrap().match_value, Some(MatchValue::Keywords(_))));
            }
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn values_count_predicate_translates_directly() {
        let filter = StructuredFilter { has_skills: Some(true), ..Default::default() };
        let tree = compile(&filter, chrono::Utc::now()).unwrap();
        let qdrant_filter = to_qdrant_filter(&tree);
        match &qdrant_filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => {
                let vc = field.values_count.as_ref().unwrap();
                assert_eq!(vc.gte, Some(1));
            }
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn min_should_match_keeps_conditions_in_should_with_no_min_should_struct() {
        let filter = StructuredFilter {
            mcp: Some(true),
            a2a: Some(true),
            filter_mode: gateway_core::filter::FilterMode::Or,
            ..Default::default()
        };
        let tree = compile(&filter, chrono::Utc::now()).unwrap();
        assert_eq!(tree.min_should_match, Some(1));
        let qdrant_filter = to_qdrant_filter(&tree);
        // Qdrant already requires at least one `should` condition to match
        // when `must` is empty, so `min_should` stays unset and the real
        // conditions live in `Filter.should` rather than a separate,
        // independently-evaluated `MinShould.conditions` list.
        assert!(qdrant_filter.min_should.is_none());
        assert_eq!(qdrant_filter.should.len(), 2);
        assert!(qdrant_filter.must.is_empty());
    }
}
