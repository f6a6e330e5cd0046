//! Global counters for delegation observability.
//!
//! Totals are lock-free atomics. Counters that need tags (error kind, agent,
//! resolution action) go through [`Metrics::inc_labeled`], which keys a small
//! map by `name{k=v,...}`. Call [`Metrics::flush`] to emit the totals as a
//! single `tracing::info!` event.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    dependencies_registered: AtomicU64,
    plans_resolved: AtomicU64,
    residual_cycles: AtomicU64,
    spawns_granted: AtomicU64,
    spawns_denied: AtomicU64,
    limiter_fail_open: AtomicU64,
    errors_classified: AtomicU64,
    resolutions_decided: AtomicU64,
    aggregation_conflicts: AtomicU64,
    labeled: Mutex<BTreeMap<String, u64>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn label_key(name: &str, labels: &[(&str, &str)]) -> String {
    let rendered: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}{{{}}}", rendered.join(","))
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            dependencies_registered: AtomicU64::new(0),
            plans_resolved: AtomicU64::new(0),
            residual_cycles: AtomicU64::new(0),
            spawns_granted: AtomicU64::new(0),
            spawns_denied: AtomicU64::new(0),
            limiter_fail_open: AtomicU64::new(0),
            errors_classified: AtomicU64::new(0),
            resolutions_decided: AtomicU64::new(0),
            aggregation_conflicts: AtomicU64::new(0),
            labeled: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn inc_dependencies_registered(&self) {
        self.dependencies_registered.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "dependencies_registered", "counter incremented");
    }

    pub fn inc_plans_resolved(&self) {
        self.plans_resolved.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "plans_resolved", "counter incremented");
    }

    pub fn inc_residual_cycles(&self) {
        self.residual_cycles.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "residual_cycles", "counter incremented");
    }

    pub fn inc_spawns_granted(&self) {
        self.spawns_granted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "spawns_granted", "counter incremented");
    }

    /// Count a denial, tagged by the scope (`user` / `org`) that denied it.
    pub fn inc_spawns_denied(&self, scope: &str) {
        self.spawns_denied.fetch_add(1, Ordering::Relaxed);
        self.inc_labeled("spawns_denied", &[("scope", scope)]);
    }

    pub fn inc_limiter_fail_open(&self) {
        self.limiter_fail_open.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "limiter_fail_open", "counter incremented");
    }

    /// Count one classification, tagged by error kind and agent.
    pub fn inc_errors_classified(&self, kind: &str, agent_id: &str) {
        self.errors_classified.fetch_add(1, Ordering::Relaxed);
        self.inc_labeled("errors_classified", &[("type", kind), ("agent", agent_id)]);
    }

    /// Count one resolution, tagged by error kind, agent and chosen action.
    pub fn inc_resolutions(&self, kind: &str, agent_id: &str, action: &str) {
        self.resolutions_decided.fetch_add(1, Ordering::Relaxed);
        self.inc_labeled(
            "error_resolutions",
            &[("type", kind), ("agent", agent_id), ("action", action)],
        );
    }

    pub fn inc_aggregation_conflicts(&self, count: u64) {
        self.aggregation_conflicts.fetch_add(count, Ordering::Relaxed);
        tracing::trace!(metric = "aggregation_conflicts", count, "counter incremented");
    }

    /// Increment a tagged counter by one.
    pub fn inc_labeled(&self, name: &str, labels: &[(&str, &str)]) {
        let key = label_key(name, labels);
        let mut map = self.labeled.lock().unwrap_or_else(|e| e.into_inner());
        *map.entry(key).or_default() += 1;
        tracing::trace!(metric = name, ?labels, "counter incremented");
    }

    /// Read a tagged counter. Labels must be given in the order they were recorded.
    pub fn labeled(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = label_key(name, labels);
        let map = self.labeled.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&key).copied().unwrap_or(0)
    }

    /// Emit all current totals as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            dependencies_registered = self.dependencies_registered(),
            plans_resolved = self.plans_resolved(),
            residual_cycles = self.residual_cycles(),
            spawns_granted = self.spawns_granted(),
            spawns_denied = self.spawns_denied(),
            limiter_fail_open = self.limiter_fail_open(),
            errors_classified = self.errors_classified(),
            resolutions_decided = self.resolutions_decided(),
            aggregation_conflicts = self.aggregation_conflicts(),
        );
    }

    pub fn dependencies_registered(&self) -> u64 {
        self.dependencies_registered.load(Ordering::Relaxed)
    }

    pub fn plans_resolved(&self) -> u64 {
        self.plans_resolved.load(Ordering::Relaxed)
    }

    pub fn residual_cycles(&self) -> u64 {
        self.residual_cycles.load(Ordering::Relaxed)
    }

    pub fn spawns_granted(&self) -> u64 {
        self.spawns_granted.load(Ordering::Relaxed)
    }

    pub fn spawns_denied(&self) -> u64 {
        self.spawns_denied.load(Ordering::Relaxed)
    }

    pub fn limiter_fail_open(&self) -> u64 {
        self.limiter_fail_open.load(Ordering::Relaxed)
    }

    pub fn errors_classified(&self) -> u64 {
        self.errors_classified.load(Ordering::Relaxed)
    }

    pub fn resolutions_decided(&self) -> u64 {
        self.resolutions_decided.load(Ordering::Relaxed)
    }

    pub fn aggregation_conflicts(&self) -> u64 {
        self.aggregation_conflicts.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.dependencies_registered,
            &self.plans_resolved,
            &self.residual_cycles,
            &self.spawns_granted,
            &self.spawns_denied,
            &self.limiter_fail_open,
            &self.errors_classified,
            &self.resolutions_decided,
            &self.aggregation_conflicts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.labeled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.plans_resolved(), 0);
        m.inc_plans_resolved();
        m.inc_plans_resolved();
        assert_eq!(m.plans_resolved(), 2);

        m.inc_spawns_granted();
        assert_eq!(m.spawns_granted(), 1);

        m.inc_aggregation_conflicts(3);
        assert_eq!(m.aggregation_conflicts(), 3);
    }

    #[test]
    fn labeled_counters_are_keyed_by_tags() {
        let m = Metrics::new();
        m.inc_errors_classified("timeout", "researcher");
        m.inc_errors_classified("timeout", "researcher");
        m.inc_errors_classified("auth_error", "researcher");

        assert_eq!(m.errors_classified(), 3);
        assert_eq!(
            m.labeled(
                "errors_classified",
                &[("type", "timeout"), ("agent", "researcher")]
            ),
            2
        );
        assert_eq!(
            m.labeled(
                "errors_classified",
                &[("type", "auth_error"), ("agent", "researcher")]
            ),
            1
        );
        assert_eq!(
            m.labeled("errors_classified", &[("type", "timeout"), ("agent", "coder")]),
            0
        );
    }

    #[test]
    fn denials_are_tagged_by_scope() {
        let m = Metrics::new();
        m.inc_spawns_denied("user");
        m.inc_spawns_denied("org");
        m.inc_spawns_denied("user");
        assert_eq!(m.spawns_denied(), 3);
        assert_eq!(m.labeled("spawns_denied", &[("scope", "user")]), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_dependencies_registered();
        m.inc_resolutions("timeout", "a", "retry");
        m.inc_limiter_fail_open();
        m.reset();
        assert_eq!(m.dependencies_registered(), 0);
        assert_eq!(m.resolutions_decided(), 0);
        assert_eq!(m.limiter_fail_open(), 0);
        assert_eq!(
            m.labeled(
                "error_resolutions",
                &[("type", "timeout"), ("agent", "a"), ("action", "retry")]
            ),
            0
        );
    }
}
