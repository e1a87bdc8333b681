//! Reference resolution
//!
//! A `ref('name')` resolves to the model of that name, or failing that to
//! the first registered source (in declaration order) that lists a table of
//! that name. A `source('s', 't')` resolves only to a registered source.

use modelrun_core::{Config, Model, Reference, Relation, ValidationError};
use std::collections::{BTreeMap, BTreeSet};
use crate::registry::ModelRegistry;

/// What a reference points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// A model built by this project
    Model(String),

    /// A relation that already exists in the engine
    External(Relation),
}

/// A reference together with its resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub reference: Reference,
    pub target: ReferenceTarget,
}

pub struct ReferenceResolver<'a> {
    registry: &'a ModelRegistry,
    config: &'a Config,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(registry: &'a ModelRegistry, config: &'a Config) -> Self {
        Self { registry, config }
    }

    /// Resolve one reference made by `model`
    pub fn resolve_reference(&self, model: &str, reference: &Reference) -> Result<ReferenceTarget, ValidationError> {
        let target = match reference {
            Reference::Ref { name } => {
                if self.registry.contains(name) {
                    Some(ReferenceTarget::Model(name.clone()))
                } else {
                    self.config
                        .source_for_table(name)
                        .map(|s| ReferenceTarget::External(Relation::new(s.schema_name(), name)))
                }
            }
            Reference::Source { source, table } => self
                .config
                .source(source, table)
                .map(|s| ReferenceTarget::External(Relation::new(s.schema_name(), table))),
        };

        target.ok_or_else(|| ValidationError::UnresolvedReference {
            model: model.to_string(),
            reference: reference.to_string(),
        })
    }

    /// Resolve every reference of a model, in reference order
    pub fn resolve(&self, model: &Model) -> Result<Vec<ResolvedReference>, ValidationError> {
        model
            .references
            .iter()
            .map(|reference| {
                Ok(ResolvedReference {
                    reference: reference.clone(),
                    target: self.resolve_reference(&model.name, reference)?,
                })
            })
            .collect()
    }

    /// Resolve all models; fails on the first unresolved reference in name order
    pub fn resolve_all(&self) -> Result<BTreeMap<String, Vec<ResolvedReference>>, ValidationError> {
        let mut resolved = BTreeMap::new();
        for model in self.registry.iter() {
            resolved.insert(model.name.clone(), self.resolve(model)?);
        }
        Ok(resolved)
    }
}

/// Model-to-model dependencies; external targets are not graph edges
pub fn model_dependencies(
    resolved: &BTreeMap<String, Vec<ResolvedReference>>,
) -> BTreeMap<String, BTreeSet<String>> {
    resolved
        .iter()
        .map(|(name, refs)| {
            let deps = refs
                .iter()
                .filter_map(|r| match &r.target {
                    ReferenceTarget::Model(dep) => Some(dep.clone()),
                    ReferenceTarget::External(_) => None,
                })
                .collect();
            (name.clone(), deps)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrun_core::{ModelDefaults, SourceConfig};

    fn config_with_sources() -> Config {
        Config {
            sources: vec![
                SourceConfig {
                    name: "raw".to_string(),
                    schema: None,
                    tables: vec!["orders".to_string(), "customers".to_string()],
                },
                SourceConfig {
                    name: "legacy".to_string(),
                    schema: Some("old".to_string()),
                    tables: vec!["orders".to_string()],
                },
            ],
            ..Config::default()
        }
    }

    #[test]
    fn resolves_models_before_sources() {
        let registry = ModelRegistry::from_sources(
            [
                ("orders", "select * from {{ source('raw', 'orders') }}"),
                ("summary", "select * from {{ ref('orders') }}"),
            ],
            &ModelDefaults::default(),
        )
        .unwrap();
        let config = config_with_sources();
        let resolver = ReferenceResolver::new(&registry, &config);

        let summary = resolver.resolve(registry.get("summary").unwrap()).unwrap();
        assert_eq!(summary[0].target, ReferenceTarget::Model("orders".to_string()));

        let orders = resolver.resolve(registry.get("orders").unwrap()).unwrap();
        assert_eq!(orders[0].target, ReferenceTarget::External(Relation::new("raw", "orders")));
    }

    #[test]
    fn bare_ref_falls_back_to_first_declared_source() {
        let registry = ModelRegistry::from_sources(
            [("summary", "select * from {{ ref('orders') }}")],
            &ModelDefaults::default(),
        )
        .unwrap();
        let config = config_with_sources();
        let resolver = ReferenceResolver::new(&registry, &config);

        let resolved = resolver.resolve(registry.get("summary").unwrap()).unwrap();
        assert_eq!(resolved[0].target, ReferenceTarget::External(Relation::new("raw", "orders")));

        let legacy = resolver
            .resolve_reference("summary", &Reference::source("legacy", "orders"))
            .unwrap();
        assert_eq!(legacy, ReferenceTarget::External(Relation::new("old", "orders")));
    }

    #[test]
    fn undefined_ref_is_unresolved() {
        let registry = ModelRegistry::from_sources(
            [("summary", "select * from {{ ref('missing_model') }}")],
            &ModelDefaults::default(),
        )
        .unwrap();
        let config = Config::default();

        let err = ReferenceResolver::new(&registry, &config).resolve_all().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnresolvedReference {
                model: "summary".to_string(),
                reference: "missing_model".to_string(),
            }
        );
    }

    #[test]
    fn source_requires_registered_table() {
        let registry = ModelRegistry::from_sources(
            [("m", "select * from {{ source('raw', 'payments') }}")],
            &ModelDefaults::default(),
        )
        .unwrap();
        let config = config_with_sources();

        let err = ReferenceResolver::new(&registry, &config).resolve_all().unwrap_err();
        assert!(matches!(err, ValidationError::UnresolvedReference { ref reference, .. } if reference == "raw.payments"));
    }

    #[test]
    fn dependencies_exclude_external_sources() {
        let registry = ModelRegistry::from_sources(
            [
                ("a", "select * from {{ source('raw', 'orders') }}"),
                ("b", "select * from {{ ref('a') }} join {{ ref('customers') }} using (id)"),
            ],
            &ModelDefaults::default(),
        )
        .unwrap();
        let config = config_with_sources();

        let resolved = ReferenceResolver::new(&registry, &config).resolve_all().unwrap();
        let deps = model_dependencies(&resolved);

        assert!(deps["a"].is_empty());
        assert_eq!(deps["b"].iter().collect::<Vec<_>>(), vec!["a"]);
    }
}
