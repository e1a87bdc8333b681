//! Loaded and validated project
//!
//! Runs the static phase in order: discovery, reference resolution, graph
//! construction and cycle detection. A `Project` only exists if all of it
//! succeeded, so nothing downstream needs to re-validate.

use modelrun_core::{Config, Model, Relation, ValidationError};
use std::collections::BTreeMap;
use crate::dag::{BuildPlan, DependencyGraph};
use crate::registry::ModelRegistry;
use crate::resolver::{model_dependencies, ReferenceResolver, ReferenceTarget, ResolvedReference};

#[derive(Debug, Clone)]
pub struct Project {
    pub config: Config,
    pub registry: ModelRegistry,
    /// Resolved references per model name
    pub references: BTreeMap<String, Vec<ResolvedReference>>,
    pub graph: DependencyGraph,
}

impl Project {
    /// Discover models from disk and validate them
    pub fn load(config: Config) -> Result<Self, ValidationError> {
        let registry = ModelRegistry::discover(&config)?;
        Self::from_registry(config, registry)
    }

    /// Validate an already-populated registry
    pub fn from_registry(config: Config, registry: ModelRegistry) -> Result<Self, ValidationError> {
        let references = ReferenceResolver::new(&registry, &config).resolve_all()?;
        let graph = DependencyGraph::from_dependencies(&model_dependencies(&references));

        // Surface cycles during loading, before anything is executed
        let plan = graph.build_plan()?;
        tracing::debug!(models = plan.len(), "project validated");

        Ok(Self {
            config,
            registry,
            references,
            graph,
        })
    }

    /// Full plan, or the plan for one model and its ancestors
    pub fn build_plan(&self, selected: Option<&str>) -> Result<BuildPlan, ValidationError> {
        match selected {
            Some(model) => self.graph.plan_for(model),
            None => self.graph.build_plan(),
        }
    }

    pub fn model(&self, name: &str) -> Result<&Model, ValidationError> {
        self.registry
            .get(name)
            .ok_or_else(|| ValidationError::UnknownModel(name.to_string()))
    }

    /// Relation a model materializes into
    pub fn relation_of(&self, name: &str) -> Result<Relation, ValidationError> {
        Ok(self.model(name)?.relation(&self.config.target.schema))
    }

    /// Relation every reference of `model` compiles to, keyed by reference
    pub fn reference_relations(&self, model: &str) -> Result<Vec<(ResolvedReference, Relation)>, ValidationError> {
        let refs = self
            .references
            .get(model)
            .ok_or_else(|| ValidationError::UnknownModel(model.to_string()))?;

        refs.iter()
            .map(|resolved| {
                let relation = match &resolved.target {
                    ReferenceTarget::Model(name) => self.relation_of(name)?,
                    ReferenceTarget::External(relation) => relation.clone(),
                };
                Ok((resolved.clone(), relation))
            })
            .collect()
    }
}
