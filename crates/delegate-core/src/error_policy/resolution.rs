//! Turning a classified failure into retry / fallback / skip / abort.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error_policy::classify::{classify, AgentError, AgentErrorKind, AgentFailure};
use crate::metrics::METRICS;
use crate::obs;

/// Bounded retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retry_attempts: u32,
    /// Retries at or beyond this attempt count are surfaced to operators.
    pub notify_after_attempts: u32,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            notify_after_attempts: 2,
            max_delay_ms: 30_000,
            max_jitter_ms: 1_000,
        }
    }
}

/// Static agent → fallback candidates map. Only the first candidate is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FallbackTable(BTreeMap<String, Vec<String>>);

impl FallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback<I, S>(mut self, agent_id: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(agent_id.into(), candidates.into_iter().map(Into::into).collect());
        self
    }

    pub fn first_for(&self, agent_id: &str) -> Option<&str> {
        self.0
            .get(agent_id)
            .and_then(|c| c.first())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Vec<String>>> for FallbackTable {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    Retry,
    Skip,
    Abort,
    Fallback,
}

impl ResolutionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Skip => "skip",
            Self::Abort => "abort",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller knows about the failing attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Attempts already made for this step, including the failed one.
    pub attempts: u32,
}

impl ResolutionContext {
    pub fn new(attempts: u32) -> Self {
        Self { attempts }
    }
}

/// Decision handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResolution {
    pub action: ResolutionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_agent: Option<String>,
    pub message: String,
    pub should_notify: bool,
    /// Wait before the retry; set only for [`ResolutionAction::Retry`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<Duration>,
}

fn base_delay_ms(kind: AgentErrorKind) -> u64 {
    match kind {
        AgentErrorKind::RateLimit => 5_000,
        AgentErrorKind::Timeout => 2_000,
        AgentErrorKind::NetworkError => 3_000,
        AgentErrorKind::ToolFailure => 1_000,
        _ => 1_000,
    }
}

/// `base(kind) × 2^(attempts-1)`, without jitter or cap.
pub fn backoff_ms(kind: AgentErrorKind, attempts: u32) -> u64 {
    let exp = attempts.saturating_sub(1).min(63);
    base_delay_ms(kind).saturating_mul(1u64 << exp)
}

/// Classifier plus retry and fallback policy.
#[derive(Debug, Clone, Default)]
pub struct ErrorPolicy {
    retry: RetryPolicy,
    fallbacks: FallbackTable,
}

impl ErrorPolicy {
    pub fn new(retry: RetryPolicy, fallbacks: FallbackTable) -> Self {
        Self { retry, fallbacks }
    }

    pub fn with_fallback<I, S>(mut self, agent_id: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks = self.fallbacks.with_fallback(agent_id, candidates);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn fallbacks(&self) -> &FallbackTable {
        &self.fallbacks
    }

    pub fn classify(
        &self,
        failure: &AgentFailure,
        agent_id: &str,
        step_id: Option<&str>,
    ) -> AgentError {
        classify(failure, agent_id, step_id)
    }

    pub fn should_retry(&self, error: &AgentError, attempts: u32) -> bool {
        error.retryable && attempts < self.retry.max_retry_attempts
    }

    /// An explicit `retry_after` is returned verbatim. Otherwise exponential
    /// backoff plus jitter, capped at `max_delay_ms`.
    pub fn get_retry_delay(&self, error: &AgentError, attempts: u32) -> Duration {
        if let Some(after) = error.retry_after {
            return after;
        }
        let jitter = if self.retry.max_jitter_ms > 0 {
            rand::rng().random_range(0..self.retry.max_jitter_ms)
        } else {
            0
        };
        let ms = backoff_ms(error.kind, attempts)
            .saturating_add(jitter)
            .min(self.retry.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Decide what to do after `error`. Retry wins while allowed, then the
    /// first configured fallback agent, then skip for timeouts and tool
    /// failures, otherwise abort.
    pub fn handle(&self, error: &AgentError, ctx: &ResolutionContext) -> ErrorResolution {
        let resolution = if self.should_retry(error, ctx.attempts) {
            let delay = self.get_retry_delay(error, ctx.attempts);
            ErrorResolution {
                action: ResolutionAction::Retry,
                fallback_agent: None,
                message: format!(
                    "retrying {} after {} (attempt {} of {}, waiting {}ms)",
                    error.agent_id,
                    error.kind,
                    ctx.attempts,
                    self.retry.max_retry_attempts,
                    delay.as_millis()
                ),
                should_notify: ctx.attempts >= self.retry.notify_after_attempts,
                retry_delay: Some(delay),
            }
        } else if let Some(fallback) = self.fallbacks.first_for(&error.agent_id) {
            ErrorResolution {
                action: ResolutionAction::Fallback,
                fallback_agent: Some(fallback.to_string()),
                message: format!(
                    "{} failed with {}; handing off to {fallback}",
                    error.agent_id, error.kind
                ),
                should_notify: true,
                retry_delay: None,
            }
        } else if matches!(
            error.kind,
            AgentErrorKind::Timeout | AgentErrorKind::ToolFailure
        ) {
            ErrorResolution {
                action: ResolutionAction::Skip,
                fallback_agent: None,
                message: format!(
                    "skipping {} after {}; step continues with a partial result",
                    error.agent_id, error.kind
                ),
                should_notify: true,
                retry_delay: None,
            }
        } else {
            ErrorResolution {
                action: ResolutionAction::Abort,
                fallback_agent: None,
                message: format!(
                    "aborting run: {} failed with {}: {}",
                    error.agent_id, error.kind, error.original_error
                ),
                should_notify: true,
                retry_delay: None,
            }
        };

        obs::emit_resolution_decided(
            &error.agent_id,
            error.kind.as_str(),
            resolution.action.as_str(),
            ctx.attempts,
        );
        METRICS.inc_resolutions(
            error.kind.as_str(),
            &error.agent_id,
            resolution.action.as_str(),
        );
        resolution
    }

    /// Classify and resolve in one call.
    pub fn resolve(
        &self,
        failure: &AgentFailure,
        agent_id: &str,
        step_id: Option<&str>,
        ctx: &ResolutionContext,
    ) -> (AgentError, ErrorResolution) {
        let error = self.classify(failure, agent_id, step_id);
        let resolution = self.handle(&error, ctx);
        (error, resolution)
    }
}
