//! Combining one step's results under a chosen strategy.

use serde_json::Value;

use crate::aggregator::conflict::detect_conflicts;
use crate::aggregator::merge::{is_empty_object, merge_payloads};
use crate::aggregator::types::{AgentResult, AggregatedResult, AggregationStrategy};
use crate::metrics::METRICS;
use crate::obs;

fn mean_confidence<'a>(results: impl IntoIterator<Item = &'a AgentResult>) -> f64 {
    let (sum, n) = results
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), r| (sum + r.confidence, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// (success, data, confidence) for one strategy.
type Outcome = (bool, Value, f64);

fn by_merge(results: &[AgentResult]) -> Outcome {
    let successful: Vec<&AgentResult> = results.iter().filter(|r| r.success).collect();
    if successful.is_empty() {
        return (false, Value::Null, 0.0);
    }
    let data = merge_payloads(successful.iter().map(|r| &r.data));
    (true, data, mean_confidence(successful))
}

fn by_priority(results: &[AgentResult]) -> Outcome {
    match results.iter().find(|r| r.success) {
        Some(first) => (true, first.data.clone(), first.confidence),
        None => (false, Value::Null, 0.0),
    }
}

fn by_voting(results: &[AgentResult]) -> Outcome {
    let successes = results.iter().filter(|r| r.success).count();
    let failures = results.len() - successes;
    let majority_success = successes >= failures;

    let majority: Vec<&AgentResult> = results
        .iter()
        .filter(|r| r.success == majority_success)
        .collect();

    let merged = merge_payloads(majority.iter().map(|r| &r.data));
    // Non-object payloads merge to nothing; keep the first one as-is.
    let data = if is_empty_object(&merged) {
        majority
            .first()
            .map(|r| r.data.clone())
            .unwrap_or(Value::Null)
    } else {
        merged
    };
    (majority_success, data, mean_confidence(majority))
}

fn by_best_confidence(results: &[AgentResult]) -> Outcome {
    let mut best: Option<&AgentResult> = None;
    for r in results {
        match best {
            Some(b) if r.confidence <= b.confidence => {}
            _ => best = Some(r),
        }
    }
    match best {
        Some(b) => (b.success, b.data.clone(), b.confidence),
        None => (false, Value::Null, 0.0),
    }
}

/// Combine `results` (one plan step) under `strategy`.
///
/// Conflict detection always runs over the full input set.
pub fn aggregate(results: &[AgentResult], strategy: AggregationStrategy) -> AggregatedResult {
    if results.is_empty() {
        obs::emit_aggregated(strategy.as_str(), 0, 0, false);
        return AggregatedResult::empty(strategy);
    }

    let conflicts = detect_conflicts(results);
    for c in &conflicts {
        obs::emit_aggregation_conflict(&c.field, &c.agent_ids);
    }
    if !conflicts.is_empty() {
        METRICS.inc_aggregation_conflicts(conflicts.len() as u64);
    }

    let (success, data, confidence) = match strategy {
        AggregationStrategy::Merge => by_merge(results),
        AggregationStrategy::Priority => by_priority(results),
        AggregationStrategy::Voting => by_voting(results),
        AggregationStrategy::BestConfidence => by_best_confidence(results),
    };

    obs::emit_aggregated(strategy.as_str(), results.len(), conflicts.len(), success);
    AggregatedResult {
        success,
        data,
        strategy,
        source_count: results.len(),
        confidence,
        conflicts,
    }
}

/// Aggregator with a default strategy that callers may override per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    default_strategy: AggregationStrategy,
}

impl ResultAggregator {
    pub fn new(default_strategy: AggregationStrategy) -> Self {
        Self { default_strategy }
    }

    pub fn default_strategy(&self) -> AggregationStrategy {
        self.default_strategy
    }

    pub fn aggregate(&self, results: &[AgentResult]) -> AggregatedResult {
        aggregate(results, self.default_strategy)
    }

    pub fn aggregate_with(
        &self,
        results: &[AgentResult],
        strategy: AggregationStrategy,
    ) -> AggregatedResult {
        aggregate(results, strategy)
    }
}
