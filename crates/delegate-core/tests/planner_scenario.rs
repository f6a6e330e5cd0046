//! Planner behaviour over a shared registry.

use delegate_core::planner::{MissingDependency, SkillDependency, SkillRegistry};

fn review_registry() -> SkillRegistry {
    let mut registry = SkillRegistry::new();
    registry.register_dependency(SkillDependency::new("A"));
    registry.register_dependency(SkillDependency::new("B").depends_on("A"));
    registry.register_dependency(SkillDependency::new("C").conflicts_with("B"));
    registry
}

#[test]
fn test_three_skill_scenario() {
    let registry = review_registry();

    let validation = registry.validate_dependencies(&["A", "B", "C"]);
    assert!(validation.valid);
    assert!(validation.missing.is_empty());

    assert_eq!(
        registry.detect_conflicts(&["B", "C"]),
        vec![("B".to_string(), "C".to_string())]
    );

    let plan = registry.resolve_execution_order(&["A", "B", "C"]);
    assert_eq!(plan.steps, vec![vec!["A", "C"], vec!["B"]]);
    assert!(!plan.has_unresolved_cycle());
}

#[test]
fn test_conflict_reported_once_whichever_side_declares() {
    let mut registry = SkillRegistry::new();
    registry.register_dependency(SkillDependency::new("x").conflicts_with("y"));
    registry.register_dependency(SkillDependency::new("y").conflicts_with("x"));
    registry.register_dependency(SkillDependency::new("z"));

    assert_eq!(registry.detect_conflicts(&["y", "x", "z"]).len(), 1);
    assert_eq!(registry.detect_conflicts(&["z", "x"]).len(), 0);
}

#[test]
fn test_exclusive_resource_conflict() {
    let mut registry = SkillRegistry::new();
    registry.register_dependency(SkillDependency::new("deploy").holds_resource("prod-db"));
    registry.register_dependency(SkillDependency::new("migrate").holds_resource("prod-db"));
    registry.register_dependency(SkillDependency::new("lint").holds_resource("repo"));

    let conflicts = registry.detect_conflicts(&["deploy", "migrate", "lint"]);
    assert_eq!(
        conflicts,
        vec![("deploy".to_string(), "migrate".to_string())]
    );
}

#[test]
fn test_validation_reports_missing_and_cycles() {
    let mut registry = SkillRegistry::new();
    registry.register_dependency(SkillDependency::new("report").depends_on("fetch"));
    registry.register_dependency(SkillDependency::new("fetch").depends_on("auth"));
    registry.register_dependency(SkillDependency::new("ping").depends_on("pong"));
    registry.register_dependency(SkillDependency::new("pong").depends_on("ping"));

    let validation = registry.validate_dependencies(&["report", "fetch", "ping", "pong"]);
    assert!(!validation.valid);
    assert!(validation.missing.contains(&MissingDependency::Absent {
        skill_id: "report".to_string(),
        dependency: "auth".to_string(),
    }));
    assert!(validation.missing.contains(&MissingDependency::Cycle {
        skill_id: "ping".to_string(),
    }));
    assert!(registry.detect_cycles("ping"));
    assert!(!registry.detect_cycles("report"));
}

#[test]
fn test_every_dependency_precedes_its_dependent() {
    let mut registry = SkillRegistry::new();
    // layered graph: s{i} depends on s{i-1} and s{i-3}
    for i in 0..30 {
        let mut dep = SkillDependency::new(format!("s{i}"));
        if i >= 1 {
            dep = dep.depends_on(format!("s{}", i - 1));
        }
        if i >= 3 {
            dep = dep.depends_on(format!("s{}", i - 3));
        }
        registry.register_dependency(dep);
    }
    // request every other skill; odd ones are assumed satisfied
    let requested: Vec<String> = (0..30).step_by(2).map(|i| format!("s{i}")).collect();
    let plan = registry.resolve_execution_order(&requested);

    assert!(!plan.has_unresolved_cycle());
    for skill in &requested {
        let step = plan.step_of(skill).expect("planned");
        for dep in registry.get_dependencies(skill) {
            if let Some(dep_step) = plan.step_of(&dep) {
                assert!(dep_step < step, "{dep} must precede {skill}");
            }
        }
    }
}

#[test]
fn test_residual_cycle_is_flagged_not_dropped() {
    let mut registry = SkillRegistry::new();
    registry.register_dependency(SkillDependency::new("root"));
    registry.register_dependency(SkillDependency::new("p").depends_on("root").depends_on("q"));
    registry.register_dependency(SkillDependency::new("q").depends_on("p"));

    let plan = registry.resolve_execution_order(&["root", "p", "q"]);
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.steps[0], vec!["root"]);
    assert!(plan.has_unresolved_cycle());
    let mut unresolved = plan.unresolved.clone();
    unresolved.sort();
    assert_eq!(unresolved, vec!["p", "q"]);
}

#[test]
fn test_registries_are_independent() {
    let a = review_registry();
    let b = SkillRegistry::new();
    assert_eq!(a.len(), 3);
    assert!(b.is_empty());
    assert_eq!(b.resolve_execution_order(&["A", "B"]).steps, vec![vec!["A", "B"]]);
}
