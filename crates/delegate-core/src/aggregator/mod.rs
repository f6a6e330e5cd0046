//! Parallel result aggregation and conflict detection.
//!
//! Agents dispatched together in one plan step each return an
//! [`AgentResult`]. Once the whole step completes the orchestrator hands the
//! batch to [`aggregate`], which combines them under the step's
//! [`AggregationStrategy`] and reports any field-level disagreements.
//!
//! # Module layout
//!
//! - [`types`]: `AgentResult`, `AggregatedResult`, `ConflictInfo`, `AggregationStrategy`
//! - [`merge`]: `deep_merge`, `deep_equal`
//! - [`conflict`]: `detect_conflicts`
//! - [`strategy`]: `aggregate`, `ResultAggregator`

pub mod conflict;
pub mod merge;
pub mod strategy;
pub mod types;

pub use conflict::detect_conflicts;
pub use merge::{deep_equal, deep_merge};
pub use strategy::{aggregate, ResultAggregator};
pub use types::{AgentResult, AggregatedResult, AggregationStrategy, ConflictInfo, UnknownStrategy};
