//! Model discovery and DAG construction
//!
//! This crate handles:
//! - Discovering models on disk (the model registry)
//! - Resolving `ref()` / `source()` references to models or external sources
//! - Building the dependency graph and a deterministic build plan
//! - Ancestor selection for single-model builds

pub mod registry;
pub mod resolver;
pub mod dag;
pub mod project;

pub use registry::ModelRegistry;
pub use resolver::{ReferenceResolver, ResolvedReference, ReferenceTarget};
pub use dag::{BuildPlan, DependencyGraph, NodeId};
pub use project::Project;
