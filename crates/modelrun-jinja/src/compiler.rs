//! Model compilation
//!
//! Renders a model's template into the SQL body that the executor wraps in
//! `CREATE ... AS`. Every `ref()` / `source()` becomes the quoted relation it
//! was resolved to during validation.

use minijinja::{Environment, Error as JinjaError, UndefinedBehavior};
use modelrun_core::{
    Config, Diagnostic, DiagnosticCode, Location, Materialization, Reference, Relation, Severity,
    ValidationError,
};
use modelrun_project::{BuildPlan, Project};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use crate::context::{ModelContext, RenderContext, TargetContext};
use crate::functions;

/// A model ready to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModel {
    pub name: String,

    pub path: PathBuf,

    /// Where the model is materialized
    pub relation: Relation,

    pub materialization: Materialization,

    /// Rendered SELECT body, without trailing semicolons
    pub sql: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Failed to render model '{model}': {message}")]
    Render {
        model: String,
        message: String,
        file_path: PathBuf,
        line: Option<usize>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CompileError {
    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Render { message, file_path, line, model } => {
                let location = match line {
                    Some(l) => Location::with_line(file_path.display().to_string(), *l),
                    None => Location::new(file_path.display().to_string()),
                };

                Diagnostic::new(
                    DiagnosticCode::TemplateRenderError,
                    Severity::Error,
                    format!("Model '{}': {}", model, message),
                )
                .with_location(location)
            }
            CompileError::Validation(e) => e.to_diagnostic(),
        }
    }
}

/// Compiles models of a validated project
pub struct ModelCompiler {
    vars: Arc<BTreeMap<String, serde_json::Value>>,
    target: TargetContext,
}

impl ModelCompiler {
    pub fn new(config: &Config) -> Self {
        Self {
            vars: Arc::new(config.vars.clone()),
            target: TargetContext::from_config(config),
        }
    }

    /// Check if SQL contains template syntax
    pub fn has_jinja(sql: &str) -> bool {
        sql.contains("{{") || sql.contains("{%") || sql.contains("{#")
    }

    /// Compile one model
    pub fn compile(&self, project: &Project, name: &str) -> Result<CompiledModel, CompileError> {
        let model = project.model(name)?;
        let relation = project.relation_of(name)?;

        let mut refs = BTreeMap::new();
        let mut sources = BTreeMap::new();
        for (resolved, target) in project.reference_relations(name)? {
            match resolved.reference {
                Reference::Ref { name } => {
                    refs.insert(name, target.quoted());
                }
                Reference::Source { source, table } => {
                    sources.insert((source, table), target.quoted());
                }
            }
        }

        let context = RenderContext {
            target: self.target.clone(),
            this: relation.quoted(),
            model: ModelContext {
                name: model.name.clone(),
                materialized: model.config.materialized,
                schema: relation.schema.clone(),
            },
        };

        let rendered = if Self::has_jinja(&model.raw_sql) {
            let env = self.environment(refs, sources);
            env.render_str(&model.raw_sql, context.to_minijinja_value())
                .map_err(|e| Self::render_error(e, &model.name, &model.path))?
        } else {
            model.raw_sql.clone()
        };

        tracing::debug!(model = name, relation = %relation, "compiled model");

        Ok(CompiledModel {
            name: model.name.clone(),
            path: model.path.clone(),
            relation,
            materialization: model.config.materialized,
            sql: normalize_body(&rendered),
        })
    }

    /// Compile every model of a plan, in plan order
    pub fn compile_plan(&self, project: &Project, plan: &BuildPlan) -> Result<Vec<CompiledModel>, CompileError> {
        plan.iter().map(|name| self.compile(project, name)).collect()
    }

    fn environment(
        &self,
        refs: BTreeMap<String, String>,
        sources: BTreeMap<(String, String), String>,
    ) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_function("ref", functions::ref_function(Arc::new(refs)));
        env.add_function("source", functions::source_function(Arc::new(sources)));
        env.add_function("var", functions::var_function(Arc::clone(&self.vars)));
        env.add_function("env_var", functions::env_var_function);
        env.add_function("config", functions::config_function);

        env
    }

    fn render_error(error: JinjaError, model: &str, path: &std::path::Path) -> CompileError {
        CompileError::Render {
            model: model.to_string(),
            message: error.to_string(),
            file_path: path.to_path_buf(),
            line: error.line(),
        }
    }
}

/// Trim surrounding whitespace and trailing semicolons
fn normalize_body(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_string()
}
