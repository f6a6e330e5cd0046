//! Failure taxonomy for agent executions.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::metrics::METRICS;
use crate::obs;

/// Coarse failure category assigned by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentErrorKind {
    Timeout,
    RateLimit,
    AuthError,
    BudgetExceeded,
    ApprovalTimeout,
    NetworkError,
    ToolFailure,
    Unknown,
}

impl AgentErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::AuthError => "auth_error",
            Self::BudgetExceeded => "budget_exceeded",
            Self::ApprovalTimeout => "approval_timeout",
            Self::NetworkError => "network_error",
            Self::ToolFailure => "tool_failure",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AgentErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw failure reported by the execution layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl AgentFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Capture an error and its `source()` chain. Sources become the stack.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut sources = Vec::new();
        let mut next = err.source();
        while let Some(source) = next {
            sources.push(source.to_string());
            next = source.source();
        }
        Self {
            message: err.to_string(),
            stack: (!sources.is_empty()).then(|| sources.join("\n")),
        }
    }

    fn haystack(&self) -> String {
        match &self.stack {
            Some(stack) => format!("{}\n{}", self.message, stack),
            None => self.message.clone(),
        }
    }
}

impl From<&anyhow::Error> for AgentFailure {
    fn from(err: &anyhow::Error) -> Self {
        let sources: Vec<String> = err.chain().skip(1).map(|e| e.to_string()).collect();
        Self {
            message: err.to_string(),
            stack: (!sources.is_empty()).then(|| sources.join("\n")),
        }
    }
}

impl From<anyhow::Error> for AgentFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::from(&err)
    }
}

impl From<&str> for AgentFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for AgentFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// A classified agent failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentError {
    pub kind: AgentErrorKind,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub original_error: String,
    pub retryable: bool,
    /// Fixed wait before retrying, when the failure dictates one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

struct Rule {
    kind: AgentErrorKind,
    pattern: Regex,
    retryable: bool,
    retry_after: Option<Duration>,
}

const RULE_SOURCES: &[(AgentErrorKind, &str, bool, Option<u64>)] = &[
    (
        AgentErrorKind::Timeout,
        r"(?i)\b(timeout|timed out|etimedout|deadline exceeded)\b",
        true,
        None,
    ),
    (
        AgentErrorKind::RateLimit,
        r"(?i)rate[ _-]?limit|\b429\b|too many requests",
        true,
        Some(60),
    ),
    (
        AgentErrorKind::AuthError,
        r"(?i)\b(401|403)\b|unauthori[sz]ed|forbidden|invalid api key|authentication",
        false,
        None,
    ),
    (
        AgentErrorKind::BudgetExceeded,
        r"(?i)budget|quota exceeded|insufficient (credits|funds|quota)",
        false,
        None,
    ),
    (
        AgentErrorKind::ApprovalTimeout,
        r"(?i)approval[ _-]?(timeout|expired)",
        false,
        None,
    ),
    (
        AgentErrorKind::NetworkError,
        r"(?i)\b(econnrefused|econnreset|enotfound|ehostunreach|epipe)\b|network|socket hang up|connection (refused|reset)",
        true,
        None,
    ),
    (
        AgentErrorKind::ToolFailure,
        r"(?i)\btool[ _-]?(failed|failure|error)\b|\btool\b.*\b(failed|failure|error)\b",
        true,
        None,
    ),
];

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        RULE_SOURCES
            .iter()
            .filter_map(|(kind, src, retryable, retry_after)| {
                Regex::new(src).ok().map(|pattern| Rule {
                    kind: *kind,
                    pattern,
                    retryable: *retryable,
                    retry_after: retry_after.map(Duration::from_secs),
                })
            })
            .collect()
    })
}

/// `retry-after: 30` style hints some providers put in the message.
fn retry_after_hint(text: &str) -> Option<Duration> {
    static HINT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = HINT
        .get_or_init(|| Regex::new(r"(?i)retry[ _-]?after\D{0,3}(\d+)").ok())
        .as_ref()?;
    let secs = re.captures(text)?.get(1)?.as_str().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

/// Classify a raw failure. Rules are tried in precedence order against the
/// message and stack; the first match wins. Unmatched failures are
/// `unknown` and never retryable.
pub fn classify(failure: &AgentFailure, agent_id: &str, step_id: Option<&str>) -> AgentError {
    let haystack = failure.haystack();

    let (kind, retryable, retry_after) = match rules().iter().find(|r| r.pattern.is_match(&haystack)) {
        Some(rule) if rule.kind == AgentErrorKind::RateLimit => (
            rule.kind,
            rule.retryable,
            retry_after_hint(&haystack).or(rule.retry_after),
        ),
        Some(rule) => (rule.kind, rule.retryable, rule.retry_after),
        None => (AgentErrorKind::Unknown, false, None),
    };

    obs::emit_error_classified(agent_id, kind.as_str(), retryable);
    METRICS.inc_errors_classified(kind.as_str(), agent_id);

    AgentError {
        kind,
        agent_id: agent_id.to_string(),
        step_id: step_id.map(str::to_string),
        original_error: failure.message.clone(),
        retryable,
        retry_after,
    }
}
