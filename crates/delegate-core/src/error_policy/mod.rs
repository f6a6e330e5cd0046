//! Agent failure classification and resolution.
//!
//! A raw [`AgentFailure`] is classified into one of eight
//! [`AgentErrorKind`]s, then [`ErrorPolicy::handle`] maps the classification
//! to a retry, fallback, skip, or abort verdict.

pub mod classify;
pub mod resolution;

pub use classify::{classify, AgentError, AgentErrorKind, AgentFailure};
pub use resolution::{
    backoff_ms, ErrorPolicy, ErrorResolution, FallbackTable, ResolutionAction,
    ResolutionContext, RetryPolicy,
};
