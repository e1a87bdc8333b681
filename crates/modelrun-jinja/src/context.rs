//! Render context for model templates
//!
//! Provides the values templates can read besides the functions:
//! `target`, `this` and `model`.

use modelrun_core::{Config, Materialization};
use serde::{Deserialize, Serialize};
use minijinja::Value as MinijinjaValue;

/// Target context (engine connection info, minus the connection string)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetContext {
    pub name: String,
    pub schema: String,
    #[serde(rename = "type")]
    pub target_type: String,
}

impl TargetContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.name.clone(),
            schema: config.target.schema.clone(),
            target_type: "duckdb".to_string(),
        }
    }
}

impl Default for TargetContext {
    fn default() -> Self {
        Self {
            name: "dev".to_string(),
            schema: "main".to_string(),
            target_type: "duckdb".to_string(),
        }
    }
}

/// Model being rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContext {
    pub name: String,
    pub materialized: Materialization,
    pub schema: String,
}

/// Everything exposed to a single render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderContext {
    pub target: TargetContext,

    /// Quoted relation of the model itself
    pub this: String,

    pub model: ModelContext,
}

impl RenderContext {
    /// Convert to MiniJinja value for rendering
    pub fn to_minijinja_value(&self) -> MinijinjaValue {
        MinijinjaValue::from_serialize(self)
    }
}
