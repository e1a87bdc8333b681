//! Configuration schema (modelrun.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::model::Materialization;

/// Default config file name, looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "modelrun.toml";

/// Execution target (where models are materialized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// DuckDB database: a file path, `:memory:`, or an `md:` MotherDuck
    /// connection string
    #[serde(default = "default_target_path")]
    pub path: String,

    /// Schema used for models without a schema override
    #[serde(default = "default_schema")]
    pub schema: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            path: default_target_path(),
            schema: default_schema(),
        }
    }
}

/// Project-wide model defaults, overridable per model with `config()`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelDefaults {
    #[serde(default)]
    pub materialized: Materialization,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// An external source: relations that exist in the engine but are not built here
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name used in `source('<name>', ...)`
    pub name: String,

    /// Schema holding the tables (defaults to the source name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Table names registered under this source
    #[serde(default)]
    pub tables: Vec<String>,
}

impl SourceConfig {
    pub fn schema_name(&self) -> &str {
        self.schema.as_deref().unwrap_or(&self.name)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }
}

/// A post-build validation query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,

    /// Query whose first column of the first row is compared
    pub sql: String,

    /// Expected scalar value
    pub expected: serde_json::Value,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Project name
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Directories (relative to the project root) searched for `*.sql` models
    #[serde(default = "default_model_paths")]
    pub model_paths: Vec<PathBuf>,

    /// Directory for compiled SQL and run_results.json
    #[serde(default = "default_output_path")]
    pub target_path: PathBuf,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub models: ModelDefaults,

    /// Values available to `var()` in templates
    #[serde(default)]
    pub vars: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub checks: Vec<CheckConfig>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            model_paths: default_model_paths(),
            target_path: default_output_path(),
            target: TargetConfig::default(),
            models: ModelDefaults::default(),
            vars: BTreeMap::new(),
            sources: Vec::new(),
            checks: Vec::new(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the project config, falling back to defaults when no file exists
    ///
    /// An explicit path must exist; the implicit `modelrun.toml` is optional.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let mut config = Self::from_file(path)?;
            config.project_root = project_dir.to_path_buf();
            return Ok(config);
        }

        let path = project_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Self::from_file(&path);
        }

        Ok(Self {
            project_root: project_dir.to_path_buf(),
            ..Self::default()
        })
    }

    /// Absolute model directories
    pub fn model_dirs(&self) -> Vec<PathBuf> {
        self.model_paths
            .iter()
            .map(|p| self.project_root.join(p))
            .collect()
    }

    /// Absolute output directory
    pub fn target_dir(&self) -> PathBuf {
        self.project_root.join(&self.target_path)
    }

    /// Look up a registered source table by source and table name
    pub fn source(&self, source: &str, table: &str) -> Option<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.name == source && s.has_table(table))
    }

    /// First registered source (in declaration order) exposing `table`
    pub fn source_for_table(&self, table: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.has_table(table))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model_paths.is_empty() {
            return Err(ConfigError::Invalid("model_paths must not be empty".to_string()));
        }

        if self.target.schema.trim().is_empty() {
            return Err(ConfigError::Invalid("target.schema must not be empty".to_string()));
        }

        for (i, source) in self.sources.iter().enumerate() {
            if self.sources[..i].iter().any(|s| s.name == source.name) {
                return Err(ConfigError::Invalid(format!(
                    "source '{}' is declared more than once",
                    source.name
                )));
            }
        }

        Ok(())
    }
}

fn default_project_name() -> String {
    "modelrun_project".to_string()
}

fn default_model_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("models")]
}

fn default_output_path() -> PathBuf {
    PathBuf::from("target")
}

fn default_target_path() -> String {
    "modelrun.duckdb".to_string()
}

fn default_schema() -> String {
    "main".to_string()
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
