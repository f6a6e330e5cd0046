//! Field-level disagreement detection between parallel results.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::aggregator::merge::deep_equal;
use crate::aggregator::types::{AgentResult, ConflictInfo};

/// Find fields on which successful object payloads disagree.
///
/// Only successful results whose `data` is an object take part. A field
/// shared by at least two of them is a conflict when any two values differ;
/// the conflict then lists every contributor, not only the outliers. Fields
/// are reported in first-seen order.
pub fn detect_conflicts(results: &[AgentResult]) -> Vec<ConflictInfo> {
    let objects: Vec<(&str, &Map<String, Value>)> = results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.data.as_object().map(|obj| (r.agent_id.as_str(), obj)))
        .collect();

    if objects.len() < 2 {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let fields: Vec<&str> = objects
        .iter()
        .flat_map(|(_, obj)| obj.keys().map(String::as_str))
        .filter(|k| seen.insert(*k))
        .collect();

    let mut conflicts = Vec::new();
    for field in fields {
        let contributions: Vec<(&str, &Value)> = objects
            .iter()
            .filter_map(|(agent, obj)| obj.get(field).map(|v| (*agent, v)))
            .collect();
        if contributions.len() < 2 {
            continue;
        }
        let first = contributions[0].1;
        if contributions.iter().all(|(_, v)| deep_equal(first, v)) {
            continue;
        }
        conflicts.push(ConflictInfo {
            field: field.to_string(),
            values: contributions.iter().map(|(_, v)| (*v).clone()).collect(),
            agent_ids: contributions.iter().map(|(a, _)| a.to_string()).collect(),
        });
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(agent: &str, data: Value) -> AgentResult {
        AgentResult::succeeded(agent, "skill", data, 0.9)
    }

    #[test]
    fn test_agreeing_results_have_no_conflicts() {
        let results = vec![ok("a", json!({"x": 1})), ok("b", json!({"x": 1, "y": 2}))];
        assert!(detect_conflicts(&results).is_empty());
    }

    #[test]
    fn test_conflict_lists_every_contributor() {
        let results = vec![
            ok("a", json!({"verdict": "ship"})),
            ok("b", json!({"verdict": "ship"})),
            ok("c", json!({"verdict": "block"})),
        ];
        let conflicts = detect_conflicts(&results);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "verdict");
        assert_eq!(conflicts[0].agent_ids, vec!["a", "b", "c"]);
        assert_eq!(
            conflicts[0].values,
            vec![json!("ship"), json!("ship"), json!("block")]
        );
    }

    #[test]
    fn test_nested_values_compare_structurally() {
        let results = vec![
            ok("a", json!({"meta": {"tags": ["x"], "n": 1}})),
            ok("b", json!({"meta": {"n": 1.0, "tags": ["x"]}})),
        ];
        assert!(detect_conflicts(&results).is_empty());
    }

    #[test]
    fn test_failed_and_non_object_results_are_ignored() {
        let results = vec![
            ok("a", json!({"x": 1})),
            AgentResult::failed("b", "skill", "boom").with_data(json!({"x": 2})),
            ok("c", json!("plain text")),
        ];
        assert!(detect_conflicts(&results).is_empty());
    }

    #[test]
    fn test_field_in_single_result_is_not_a_conflict() {
        let results = vec![ok("a", json!({"only_a": 1})), ok("b", json!({"only_b": 2}))];
        assert!(detect_conflicts(&results).is_empty());
    }
}
