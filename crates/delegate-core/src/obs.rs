//! Structured observability hooks for the delegation core.
//!
//! This module provides:
//! - Plan-scoped tracing spans via the `PlanSpan` RAII guard
//! - Emission functions for registry, planning, spawn gating, failure
//!   handling and aggregation events
//!
//! Events are emitted at `info!` (or `warn!` for anomalies). For JSON output
//! initialise tracing with [`crate::telemetry::init_tracing`] and `json = true`.

use tracing::{info, warn};

/// RAII guard that enters a plan-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = PlanSpan::enter("plan-42");
/// // every event below carries plan_id = "plan-42"
/// ```
pub struct PlanSpan {
    _span: tracing::span::EnteredSpan,
}

impl PlanSpan {
    /// Create and enter a span tagged with the plan id.
    pub fn enter(plan_id: &str) -> Self {
        let span = tracing::info_span!("delegate.plan", plan_id = %plan_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_dependency_registered(skill_id: &str, depends_on: usize, conflicts: usize) {
    info!(
        event = "registry.dependency_registered",
        skill_id = %skill_id,
        depends_on = depends_on,
        conflicts = conflicts,
    );
}

pub fn emit_cycle_detected(skill_id: &str) {
    warn!(event = "registry.cycle_detected", skill_id = %skill_id);
}

pub fn emit_skill_conflict(skill_a: &str, skill_b: &str) {
    info!(event = "registry.conflict_detected", skill_a = %skill_a, skill_b = %skill_b);
}

/// Emit event: a plan was resolved into `steps` parallel groups.
pub fn emit_plan_resolved(skills: usize, steps: usize) {
    info!(event = "plan.resolved", skills = skills, steps = steps);
}

/// Emit event: skills stuck in a cycle were forced into a final step.
pub fn emit_residual_cycle(skill_ids: &[String]) {
    warn!(
        event = "plan.residual_cycle",
        skills = ?skill_ids,
        "cyclic skills emitted as final step"
    );
}

pub fn emit_spawn_granted(user_id: &str, org_id: &str, remaining: u32) {
    info!(
        event = "spawn.granted",
        user_id = %user_id,
        org_id = %org_id,
        remaining = remaining,
    );
}

pub fn emit_spawn_denied(scope: &str, id: &str, limit: u32) {
    warn!(event = "spawn.denied", scope = %scope, id = %id, limit = limit);
}

/// Emit event: the counter store was unreachable and the check failed open.
pub fn emit_limiter_fail_open(error: &dyn std::fmt::Display) {
    warn!(event = "spawn.fail_open", error = %error);
}

pub fn emit_spawn_record_failed(user_id: &str, org_id: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "spawn.record_failed",
        user_id = %user_id,
        org_id = %org_id,
        error = %error,
    );
}

pub fn emit_error_classified(agent_id: &str, kind: &str, retryable: bool) {
    info!(
        event = "agent_error.classified",
        agent_id = %agent_id,
        kind = %kind,
        retryable = retryable,
    );
}

pub fn emit_resolution_decided(agent_id: &str, kind: &str, action: &str, attempts: u32) {
    info!(
        event = "agent_error.resolved",
        agent_id = %agent_id,
        kind = %kind,
        action = %action,
        attempts = attempts,
    );
}

pub fn emit_aggregation_conflict(field: &str, agent_ids: &[String]) {
    warn!(event = "aggregate.conflict", field = %field, agents = ?agent_ids);
}

pub fn emit_aggregated(strategy: &str, sources: usize, conflicts: usize, success: bool) {
    info!(
        event = "aggregate.completed",
        strategy = %strategy,
        sources = sources,
        conflicts = conflicts,
        success = success,
    );
}
