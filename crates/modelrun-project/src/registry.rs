//! Model registry
//!
//! Every `*.sql` file under the configured model directories is one model,
//! named after its file stem. Names must be unique across all directories.

use modelrun_core::{Config, Model, ModelConfig, ModelDefaults, ValidationError};
use modelrun_sql::{ConfigDirective, ReferenceExtractor};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All models of a project, keyed and ordered by name
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Model>,
}

impl ModelRegistry {
    /// Discover models under every configured model directory
    pub fn discover(config: &Config) -> Result<Self, ValidationError> {
        let mut registry = Self::default();

        for dir in config.model_dirs() {
            if !dir.is_dir() {
                return Err(ValidationError::ModelPathNotFound(dir));
            }

            tracing::debug!(path = %dir.display(), "scanning for models");

            let walker = WalkDir::new(&dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter();

            for entry in walker {
                let entry = entry.map_err(|e| ValidationError::Io {
                    path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone()),
                    message: e.to_string(),
                })?;

                if !entry.file_type().is_file() || !is_sql_file(entry.path()) {
                    continue;
                }

                let model = Self::load_file(entry.path(), &config.models)?;
                registry.insert(model)?;
            }
        }

        tracing::debug!(count = registry.len(), "discovered models");
        Ok(registry)
    }

    /// Build a registry from in-memory sources (name, sql)
    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
        defaults: &ModelDefaults,
    ) -> Result<Self, ValidationError> {
        let mut registry = Self::default();
        for (name, sql) in sources {
            let path = PathBuf::from(format!("{}.sql", name));
            registry.insert(Self::parse_model(name, path, sql.to_string(), defaults)?)?;
        }
        Ok(registry)
    }

    /// Read and parse a single model file
    pub fn load_file(path: &Path, defaults: &ModelDefaults) -> Result<Model, ValidationError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ValidationError::Io {
                path: path.to_path_buf(),
                message: "model file name is not valid UTF-8".to_string(),
            })?
            .to_string();

        let raw_sql = std::fs::read_to_string(path).map_err(|e| ValidationError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::parse_model(&name, path.to_path_buf(), raw_sql, defaults)
    }

    /// Build a model from its source text: extract references and apply config
    pub fn parse_model(
        name: &str,
        path: PathBuf,
        raw_sql: String,
        defaults: &ModelDefaults,
    ) -> Result<Model, ValidationError> {
        let directive = ConfigDirective::parse(&raw_sql).map_err(|e| ValidationError::InvalidConfig {
            model: name.to_string(),
            message: e.to_string(),
        })?;

        let mut config = ModelConfig {
            materialized: defaults.materialized,
            schema: defaults.schema.clone(),
        };

        if let Some(directive) = directive {
            for key in &directive.ignored {
                tracing::warn!(model = name, key = key.as_str(), "ignoring unsupported config key");
            }
            if let Some(materialized) = directive.materialized {
                config.materialized = materialized;
            }
            if directive.schema.is_some() {
                config.schema = directive.schema;
            }
        }

        let references = ReferenceExtractor::extract(&raw_sql);

        Ok(Model {
            name: name.to_string(),
            path,
            raw_sql,
            config,
            references,
        })
    }

    /// Add a model, rejecting duplicate names
    pub fn insert(&mut self, model: Model) -> Result<(), ValidationError> {
        if let Some(existing) = self.models.get(&model.name) {
            return Err(ValidationError::DuplicateModel {
                name: model.name.clone(),
                first: existing.path.clone(),
                second: model.path,
            });
        }

        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Models in name order
    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.models.keys()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("sql"))
        .unwrap_or(false)
}
