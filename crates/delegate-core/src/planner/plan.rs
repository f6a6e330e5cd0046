//! Scoped topological planning.
//!
//! Turns a requested subset of skills into an ordered list of steps. Every
//! skill in a step may be dispatched concurrently; a step only starts after
//! all earlier steps complete.
//!
//! Ordering uses Kahn's algorithm restricted to the requested subset: edges
//! whose other endpoint lies outside the subset are treated as already
//! satisfied. Each round takes *every* zero in-degree skill, so the plan is
//! level-ordered rather than a single linear sequence.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::metrics::METRICS;
use crate::obs;
use crate::planner::registry::{dedup_in_order, SkillRegistry};

/// Ordered groups of skills that may run in parallel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Steps in dispatch order.
    pub steps: Vec<Vec<String>>,
    /// Skills that could not be ordered because they sit on (or behind) a
    /// cycle inside the requested subset. When non-empty they form the last
    /// entry of `steps`.
    pub unresolved: Vec<String>,
}

impl ExecutionPlan {
    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `true` when the final step was produced by the residual-cycle branch.
    /// Callers should treat this as an error signal: skills in that step may
    /// have unmet dependencies.
    pub fn has_unresolved_cycle(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Index of the step containing `skill_id`.
    pub fn step_of(&self, skill_id: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.iter().any(|s| s == skill_id))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec<String>> {
        self.steps.iter()
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a Vec<String>;
    type IntoIter = std::slice::Iter<'a, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl SkillRegistry {
    /// Resolve `skill_ids` into parallel-eligible steps.
    ///
    /// Within a step skills keep their relative input order. If a round
    /// finds no ready skill while some remain, the remainder is emitted as
    /// one final step and recorded in [`ExecutionPlan::unresolved`] rather
    /// than dropped.
    pub fn resolve_execution_order<S: AsRef<str>>(&self, skill_ids: &[S]) -> ExecutionPlan {
        let ids = dedup_in_order(skill_ids);
        let requested: HashSet<&str> = ids.iter().copied().collect();

        let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
        let mut dependents: HashMap<String, Vec<&str>> = HashMap::new();

        for &skill in &ids {
            let mut degree = 0;
            for dep in self.get_dependencies(skill) {
                if requested.contains(dep.as_str()) {
                    degree += 1;
                    dependents.entry(dep).or_default().push(skill);
                }
            }
            // A direct self-dependency is a cycle confined to the subset.
            if self
                .get(skill)
                .is_some_and(|d| d.depends_on.contains(skill))
            {
                degree += 1;
            }
            in_degree.insert(skill, degree);
        }

        let mut remaining = ids;
        let mut plan = ExecutionPlan::default();

        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .copied()
                .filter(|s| in_degree.get(s).copied().unwrap_or(0) == 0)
                .collect();

            if ready.is_empty() {
                plan = emit_residual_cycle_step(plan, &remaining);
                break;
            }

            for skill in &ready {
                if let Some(children) = dependents.get(*skill) {
                    for child in children {
                        if let Some(deg) = in_degree.get_mut(child) {
                            *deg = deg.saturating_sub(1);
                        }
                    }
                }
            }

            let ready_set: HashSet<&str> = ready.iter().copied().collect();
            remaining.retain(|s| !ready_set.contains(s));
            plan.steps.push(ready.into_iter().map(str::to_string).collect());
        }

        obs::emit_plan_resolved(plan.steps.iter().map(Vec::len).sum(), plan.steps.len());
        METRICS.inc_plans_resolved();
        plan
    }
}

/// Residual-cycle policy: skills that can never reach in-degree zero are
/// dispatched together as a final step so no work is silently lost.
fn emit_residual_cycle_step(mut plan: ExecutionPlan, remaining: &[&str]) -> ExecutionPlan {
    let residual: Vec<String> = remaining.iter().map(|s| s.to_string()).collect();
    obs::emit_residual_cycle(&residual);
    METRICS.inc_residual_cycles();
    plan.unresolved = residual.clone();
    plan.steps.push(residual);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::registry::SkillDependency;

    fn registry(deps: Vec<SkillDependency>) -> SkillRegistry {
        let mut r = SkillRegistry::new();
        for d in deps {
            r.register_dependency(d);
        }
        r
    }

    #[test]
    fn test_independent_skills_share_one_step() {
        let r = registry(vec![SkillDependency::new("a"), SkillDependency::new("b")]);
        let plan = r.resolve_execution_order(&["a", "b"]);
        assert_eq!(plan.steps, vec![vec!["a", "b"]]);
        assert!(!plan.has_unresolved_cycle());
    }

    #[test]
    fn test_chain_yields_one_skill_per_step() {
        let r = registry(vec![
            SkillDependency::new("c"),
            SkillDependency::new("b").depends_on("c"),
            SkillDependency::new("a").depends_on("b"),
        ]);
        let plan = r.resolve_execution_order(&["a", "b", "c"]);
        assert_eq!(plan.steps, vec![vec!["c"], vec!["b"], vec!["a"]]);
    }

    #[test]
    fn test_diamond_groups_middle_layer() {
        let r = registry(vec![
            SkillDependency::new("a"),
            SkillDependency::new("b").depends_on("a"),
            SkillDependency::new("c").depends_on("a"),
            SkillDependency::new("d").depends_on("b").depends_on("c"),
        ]);
        let plan = r.resolve_execution_order(&["d", "c", "b", "a"]);
        assert_eq!(plan.steps, vec![vec!["a"], vec!["c", "b"], vec!["d"]]);
    }

    #[test]
    fn test_out_of_subset_dependency_is_ignored() {
        let r = registry(vec![
            SkillDependency::new("fetch"),
            SkillDependency::new("summarize").depends_on("fetch"),
        ]);
        let plan = r.resolve_execution_order(&["summarize"]);
        assert_eq!(plan.steps, vec![vec!["summarize"]]);
    }

    #[test]
    fn test_dependency_through_unrequested_skill_still_orders() {
        // a -> x -> b, x not requested: b must still precede a.
        let r = registry(vec![
            SkillDependency::new("b"),
            SkillDependency::new("x").depends_on("b"),
            SkillDependency::new("a").depends_on("x"),
        ]);
        let plan = r.resolve_execution_order(&["a", "b"]);
        assert_eq!(plan.steps, vec![vec!["b"], vec!["a"]]);
    }

    #[test]
    fn test_cycle_in_subset_becomes_final_step() {
        let r = registry(vec![
            SkillDependency::new("root"),
            SkillDependency::new("a").depends_on("b").depends_on("root"),
            SkillDependency::new("b").depends_on("a"),
        ]);
        let plan = r.resolve_execution_order(&["root", "a", "b"]);
        assert_eq!(plan.steps, vec![vec!["root"], vec!["a", "b"]]);
        assert!(plan.has_unresolved_cycle());
        assert_eq!(plan.unresolved, vec!["a", "b"]);
    }

    #[test]
    fn test_self_dependency_is_residual() {
        let r = registry(vec![SkillDependency::new("loop").depends_on("loop")]);
        let plan = r.resolve_execution_order(&["loop"]);
        assert_eq!(plan.steps, vec![vec!["loop"]]);
        assert_eq!(plan.unresolved, vec!["loop"]);
    }

    #[test]
    fn test_duplicate_ids_are_planned_once() {
        let r = registry(vec![SkillDependency::new("a")]);
        let plan = r.resolve_execution_order(&["a", "a"]);
        assert_eq!(plan.steps, vec![vec!["a"]]);
    }

    #[test]
    fn test_empty_request_yields_empty_plan() {
        let r = SkillRegistry::new();
        let plan = r.resolve_execution_order::<&str>(&[]);
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn test_step_of_and_iteration() {
        let r = registry(vec![
            SkillDependency::new("a"),
            SkillDependency::new("b").depends_on("a"),
        ]);
        let plan = r.resolve_execution_order(&["a", "b"]);
        assert_eq!(plan.step_of("a"), Some(0));
        assert_eq!(plan.step_of("b"), Some(1));
        assert_eq!(plan.step_of("zzz"), None);
        assert_eq!((&plan).into_iter().count(), 2);
    }
}
