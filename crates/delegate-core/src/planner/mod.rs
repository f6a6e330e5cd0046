//! Dependency registry and execution planning.
//!
//! # Module layout
//!
//! - [`registry`]: `SkillDependency`, `SkillRegistry`, closure / cycle /
//!   conflict / validation queries
//! - [`plan`]: `ExecutionPlan` and `SkillRegistry::resolve_execution_order`
//!
//! ## Quick start
//!
//! ```rust
//! use delegate_core::planner::{SkillDependency, SkillRegistry};
//!
//! let mut registry = SkillRegistry::new();
//! registry.register_dependency(SkillDependency::new("research"));
//! registry.register_dependency(SkillDependency::new("draft").depends_on("research"));
//!
//! let plan = registry.resolve_execution_order(&["draft", "research"]);
//! assert_eq!(plan.steps, vec![vec!["research"], vec!["draft"]]);
//! ```

pub mod plan;
pub mod registry;

pub use plan::ExecutionPlan;
pub use registry::{DependencyValidation, MissingDependency, SkillDependency, SkillRegistry};
