//! Delegation orchestration core.
//!
//! Building blocks for running a request as a set of cooperating agents:
//!
//! - [`planner`] orders skills into parallel steps and reports conflicts
//! - [`rate_limit`] gates each agent spawn per user and per organization
//! - [`error_policy`] classifies agent failures and picks retry, fallback,
//!   skip, or abort
//! - [`aggregator`] combines the results of one step
//!
//! The orchestration loop that drives these (dispatching agents, awaiting a
//! step, advancing the plan) belongs to the embedding application.

pub mod aggregator;
pub mod config;
pub mod domain;
pub mod error_policy;
pub mod metrics;
pub mod obs;
pub mod planner;
pub mod rate_limit;
pub mod telemetry;

pub use aggregator::{
    aggregate, AgentResult, AggregatedResult, AggregationStrategy, ConflictInfo, ResultAggregator,
};
pub use config::{DelegateConfig, TelemetryConfig};
pub use domain::{DelegateError, Result};
pub use error_policy::{
    classify, AgentError, AgentErrorKind, AgentFailure, ErrorPolicy, ErrorResolution,
    FallbackTable, ResolutionAction, ResolutionContext, RetryPolicy,
};
pub use planner::{
    DependencyValidation, ExecutionPlan, MissingDependency, SkillDependency, SkillRegistry,
};
pub use rate_limit::{
    Clock, ManualClock, RateLimitConfig, RateLimitResult, SpawnRateLimiter, SpawnUsage,
    SystemClock,
};

pub use delegate_state::{CounterScope, CounterStore, StorageError, StorageResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
