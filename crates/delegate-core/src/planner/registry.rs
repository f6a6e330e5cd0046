//! Skill dependency registry.
//!
//! Skills declare what they depend on, which other skills they cannot run
//! alongside, and which exclusive resources they hold while running. The
//! registry answers transitive-closure, cycle and conflict queries over any
//! requested subset.
//!
//! Nothing here returns an error: dangling references are tolerated, unknown
//! skills behave as skills with no edges, and anomalies are reported through
//! return values.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::metrics::METRICS;
use crate::obs;

/// Ordering and exclusion constraints for one skill.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillDependency {
    pub skill_id: String,
    /// Skills that must complete before this one may start.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    /// Skills that must not run in the same step. Need not be symmetric.
    #[serde(default)]
    pub conflicts: BTreeSet<String>,
    /// Resource tags held exclusively while the skill runs.
    #[serde(default)]
    pub exclusive_resources: BTreeSet<String>,
}

impl SkillDependency {
    pub fn new(skill_id: impl Into<String>) -> Self {
        Self {
            skill_id: skill_id.into(),
            ..Self::default()
        }
    }

    pub fn depends_on(mut self, skill_id: impl Into<String>) -> Self {
        self.depends_on.insert(skill_id.into());
        self
    }

    pub fn conflicts_with(mut self, skill_id: impl Into<String>) -> Self {
        self.conflicts.insert(skill_id.into());
        self
    }

    pub fn holds_resource(mut self, tag: impl Into<String>) -> Self {
        self.exclusive_resources.insert(tag.into());
        self
    }
}

/// A problem found by [`SkillRegistry::validate_dependencies`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissingDependency {
    /// `dependency` is required (transitively) by `skill_id` but was not
    /// part of the requested set.
    Absent { skill_id: String, dependency: String },
    /// `skill_id` reaches a dependency cycle.
    Cycle { skill_id: String },
}

impl MissingDependency {
    pub fn skill_id(&self) -> &str {
        match self {
            MissingDependency::Absent { skill_id, .. } | MissingDependency::Cycle { skill_id } => {
                skill_id
            }
        }
    }
}

/// Outcome of validating a requested skill set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyValidation {
    pub valid: bool,
    pub missing: Vec<MissingDependency>,
}

/// Registry of [`SkillDependency`] declarations keyed by skill id.
///
/// Owned by whoever plans a run; there is no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    skills: HashMap<String, SkillDependency>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the declaration for `dep.skill_id`.
    pub fn register_dependency(&mut self, dep: SkillDependency) {
        obs::emit_dependency_registered(&dep.skill_id, dep.depends_on.len(), dep.conflicts.len());
        METRICS.inc_dependencies_registered();
        self.skills.insert(dep.skill_id.clone(), dep);
    }

    pub fn get(&self, skill_id: &str) -> Option<&SkillDependency> {
        self.skills.get(skill_id)
    }

    /// Registered skill ids, sorted.
    pub fn skill_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.skills.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    fn direct_deps(&self, skill_id: &str) -> Vec<&str> {
        self.skills
            .get(skill_id)
            .map(|d| d.depends_on.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Transitive closure of `depends_on`, deduplicated, excluding `skill_id`
    /// itself. Unknown skills have no dependencies.
    pub fn get_dependencies(&self, skill_id: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut closure = Vec::new();
        let mut stack = vec![skill_id];

        while let Some(current) = stack.pop() {
            for next in self.direct_deps(current) {
                if next == skill_id {
                    continue;
                }
                if seen.insert(next) {
                    closure.push(next.to_string());
                    stack.push(next);
                }
            }
        }
        closure
    }

    /// Skills whose declaration lists `skill_id` directly in `depends_on`.
    pub fn dependents_of(&self, skill_id: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .skills
            .values()
            .filter(|d| d.depends_on.contains(skill_id))
            .map(|d| d.skill_id.clone())
            .collect();
        dependents.sort_unstable();
        dependents
    }

    /// DFS from `skill_id` with visiting/visited marking. Returns `true` as
    /// soon as a node currently on the DFS path is reached again, so a skill
    /// whose closure merely reaches a cycle also reports one.
    pub fn detect_cycles(&self, skill_id: &str) -> bool {
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut visited: HashSet<&str> = HashSet::new();
        // (node, its direct deps, index of next dep to explore)
        let mut stack: Vec<(&str, Vec<&str>, usize)> =
            vec![(skill_id, self.direct_deps(skill_id), 0)];
        visiting.insert(skill_id);

        while let Some((node, deps, idx)) = stack.last_mut() {
            if *idx < deps.len() {
                let next = deps[*idx];
                *idx += 1;
                if visiting.contains(next) {
                    obs::emit_cycle_detected(skill_id);
                    return true;
                }
                if visited.contains(next) {
                    continue;
                }
                visiting.insert(next);
                stack.push((next, self.direct_deps(next), 0));
            } else {
                let done = *node;
                visiting.remove(done);
                visited.insert(done);
                stack.pop();
            }
        }
        false
    }

    /// `true` when `a` and `b` may not share a step.
    fn pair_conflicts(&self, a: &str, b: &str) -> bool {
        let dep_a = self.skills.get(a);
        let dep_b = self.skills.get(b);

        let declared = dep_a.is_some_and(|d| d.conflicts.contains(b))
            || dep_b.is_some_and(|d| d.conflicts.contains(a));
        let shared_resource = match (dep_a, dep_b) {
            (Some(x), Some(y)) => !x.exclusive_resources.is_disjoint(&y.exclusive_resources),
            _ => false,
        };
        declared || shared_resource
    }

    /// Every conflicting pair within `skill_ids`, each reported once in
    /// input order, whichever side declared it.
    pub fn detect_conflicts<S: AsRef<str>>(&self, skill_ids: &[S]) -> Vec<(String, String)> {
        let ids = dedup_in_order(skill_ids);
        let mut pairs = Vec::new();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                if self.pair_conflicts(a, b) {
                    obs::emit_skill_conflict(a, b);
                    pairs.push((a.to_string(), b.to_string()));
                }
            }
        }
        pairs
    }

    /// Check each requested skill for cycles and for transitive
    /// dependencies missing from the requested set.
    pub fn validate_dependencies<S: AsRef<str>>(&self, skill_ids: &[S]) -> DependencyValidation {
        let ids = dedup_in_order(skill_ids);
        let requested: HashSet<&str> = ids.iter().copied().collect();
        let mut missing = Vec::new();

        for skill in &ids {
            if self.detect_cycles(skill) {
                missing.push(MissingDependency::Cycle {
                    skill_id: skill.to_string(),
                });
            }
            for dep in self.get_dependencies(skill) {
                if !requested.contains(dep.as_str()) {
                    missing.push(MissingDependency::Absent {
                        skill_id: skill.to_string(),
                        dependency: dep,
                    });
                }
            }
        }

        DependencyValidation {
            valid: missing.is_empty(),
            missing,
        }
    }
}

/// Drop repeated ids, keeping first occurrences in order.
pub(crate) fn dedup_in_order<S: AsRef<str>>(skill_ids: &[S]) -> Vec<&str> {
    let mut seen = HashSet::new();
    skill_ids
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| seen.insert(*id))
        .collect()
}
