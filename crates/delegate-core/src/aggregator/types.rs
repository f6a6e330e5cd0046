//! Result and aggregation value types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output of one agent run, as reported by the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    pub skill_id: String,
    pub success: bool,
    /// Opaque structured payload.
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Self-reported confidence in `[0, 1]`.
    pub confidence: f64,
}

impl AgentResult {
    /// A successful result carrying `data`.
    pub fn succeeded(
        agent_id: impl Into<String>,
        skill_id: impl Into<String>,
        data: Value,
        confidence: f64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            skill_id: skill_id.into(),
            success: true,
            data,
            duration_ms: 0,
            error: None,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A failed result with an error message and no payload.
    pub fn failed(
        agent_id: impl Into<String>,
        skill_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            skill_id: skill_id.into(),
            success: false,
            data: Value::Null,
            duration_ms: 0,
            error: Some(error.into()),
            confidence: 0.0,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// How the results of one plan step are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Deep-merge every successful payload in input order.
    #[default]
    Merge,
    /// First successful result wins; input order is priority order.
    Priority,
    /// Majority on the success flag, then merge the majority.
    Voting,
    /// Single highest-confidence result.
    BestConfidence,
}

impl AggregationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationStrategy::Merge => "merge",
            AggregationStrategy::Priority => "priority",
            AggregationStrategy::Voting => "voting",
            AggregationStrategy::BestConfidence => "best_confidence",
        }
    }
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognised strategy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown aggregation strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for AggregationStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(AggregationStrategy::Merge),
            "priority" => Ok(AggregationStrategy::Priority),
            "voting" => Ok(AggregationStrategy::Voting),
            "best_confidence" | "best-confidence" => Ok(AggregationStrategy::BestConfidence),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Disagreement between parallel results on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub field: String,
    /// Every contributed value, aligned with `agent_ids`.
    pub values: Vec<Value>,
    pub agent_ids: Vec<String>,
}

/// Combined output of one plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub success: bool,
    pub data: Value,
    pub strategy: AggregationStrategy,
    /// Number of input results considered.
    pub source_count: usize,
    pub confidence: f64,
    pub conflicts: Vec<ConflictInfo>,
}

impl AggregatedResult {
    /// Result of aggregating zero inputs.
    pub fn empty(strategy: AggregationStrategy) -> Self {
        Self {
            success: false,
            data: Value::Null,
            strategy,
            source_count: 0,
            confidence: 0.0,
            conflicts: Vec::new(),
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}
