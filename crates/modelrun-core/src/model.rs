//! Model, reference and relation types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Physical form a model is persisted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    /// Virtual view, re-evaluated on every read
    #[default]
    View,

    /// Persisted table
    Table,
}

impl Materialization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Table => "table",
        }
    }

    /// Relation kind this materialization produces in the engine
    pub fn relation_kind(&self) -> RelationKind {
        match self {
            Self::View => RelationKind::View,
            Self::Table => RelationKind::Table,
        }
    }
}

impl std::fmt::Display for Materialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Materialization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Ok(Self::View),
            "table" => Ok(Self::Table),
            other => Err(format!(
                "unsupported materialization '{}' (expected 'view' or 'table')",
                other
            )),
        }
    }
}

/// Kind of an existing relation in the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Table,
    View,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::View => write!(f, "view"),
        }
    }
}

/// A schema-qualified relation name in the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
    /// Schema the relation lives in
    pub schema: String,

    /// Relation (table or view) name
    pub name: String,
}

impl Relation {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Quoted identifier suitable for splicing into SQL: `"schema"."name"`
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A dependency declared in model source text
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Reference {
    /// `ref('name')`
    Ref { name: String },

    /// `source('source', 'table')`
    Source { source: String, table: String },
}

impl Reference {
    pub fn model(name: impl Into<String>) -> Self {
        Self::Ref { name: name.into() }
    }

    pub fn source(source: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Source {
            source: source.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ref { name } => write!(f, "{}", name),
            Self::Source { source, table } => write!(f, "{}.{}", source, table),
        }
    }
}

/// Resolved per-model configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// How the model is persisted
    pub materialized: Materialization,

    /// Target schema override (falls back to the target's default schema)
    pub schema: Option<String>,
}

/// A named SQL transformation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Unique model name (the file stem)
    pub name: String,

    /// Path of the defining file
    pub path: PathBuf,

    /// Raw templated source text
    pub raw_sql: String,

    /// Configuration after applying project defaults and the model's directive
    pub config: ModelConfig,

    /// Every reference found in the source, deduplicated and ordered
    pub references: BTreeSet<Reference>,
}

impl Model {
    /// Relation this model materializes into
    pub fn relation(&self, default_schema: &str) -> Relation {
        let schema = self.config.schema.as_deref().unwrap_or(default_schema);
        Relation::new(schema, &self.name)
    }
}
