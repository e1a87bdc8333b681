//! Sequential model executor
//!
//! Materializes compiled models one at a time in plan order. The first
//! failure stops the run and every model after it is reported as skipped.
//! Relations that were already materialized are left in place.

use modelrun_core::{Diagnostic, DiagnosticCode, Location, RunReport, RunStatus, Severity};
use modelrun_jinja::CompiledModel;
use modelrun_warehouse::{Engine, EngineError};
use crate::reporter::{ReporterError, RunReporter};

/// A model failed inside the engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Model '{model}' failed: {source}")]
pub struct ModelExecutionError {
    pub model: String,
    pub source: EngineError,
}

impl ModelExecutionError {
    /// Convert to a diagnostic
    pub fn to_diagnostic(&self, file: Option<&std::path::Path>) -> Diagnostic {
        let diagnostic = Diagnostic::new(
            DiagnosticCode::ModelExecutionError,
            Severity::Error,
            self.to_string(),
        );

        match file {
            Some(path) => diagnostic.with_location(Location::new(path.display().to_string())),
            None => diagnostic,
        }
    }
}

/// Diagnostics for the failed model and the models skipped after it
pub fn failure_diagnostics(report: &RunReport, models: &[CompiledModel]) -> Vec<Diagnostic> {
    let skipped: Vec<String> = report
        .results
        .iter()
        .filter(|r| r.status == RunStatus::Skipped)
        .map(|r| r.model.clone())
        .collect();

    let mut diagnostics: Vec<Diagnostic> = report
        .results
        .iter()
        .filter(|r| r.status == RunStatus::Error)
        .map(|r| {
            let mut diagnostic = Diagnostic::new(
                DiagnosticCode::ModelExecutionError,
                Severity::Error,
                format!(
                    "Model '{}' failed: {}",
                    r.model,
                    r.error.as_deref().unwrap_or("unknown error")
                ),
            )
            .with_impact(skipped.clone());

            if let Some(model) = models.iter().find(|m| m.name == r.model) {
                diagnostic = diagnostic.with_location(Location::new(model.path.display().to_string()));
            }
            diagnostic
        })
        .collect();

    if !skipped.is_empty() {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticCode::ModelSkipped,
                Severity::Warn,
                format!("{} model(s) skipped after a failure", skipped.len()),
            )
            .with_impact(skipped),
        );
    }

    diagnostics
}

pub struct Executor<'a> {
    engine: &'a dyn Engine,
}

impl<'a> Executor<'a> {
    pub fn new(engine: &'a dyn Engine) -> Self {
        Self { engine }
    }

    /// Run compiled models in the given (plan) order
    ///
    /// Model failures end up in the report; only reporter misuse is an `Err`.
    pub async fn run(&self, models: &[CompiledModel]) -> Result<RunReport, ReporterError> {
        let mut reporter = RunReporter::new(
            models
                .iter()
                .map(|m| (m.name.as_str(), m.materialization, &m.relation)),
        );

        tracing::info!(engine = self.engine.name(), models = models.len(), "starting run");

        for model in models {
            reporter.start(&model.name)?;

            match self.materialize(model).await {
                Ok(()) => {
                    tracing::info!(
                        model = %model.name,
                        relation = %model.relation,
                        materialized = %model.materialization,
                        "model succeeded"
                    );
                    reporter.succeed(&model.name)?;
                }
                Err(e) => {
                    tracing::error!(model = %model.name, error = %e.source, "model failed");
                    reporter.fail(&model.name, e.source.to_string())?;

                    let skipped = reporter.skip_remaining();
                    if skipped > 0 {
                        tracing::warn!(skipped, "stopping run after failure");
                    }
                    break;
                }
            }
        }

        let summary = reporter.summary();
        tracing::info!(
            success = summary.success,
            error = summary.error,
            skipped = summary.skipped,
            "run finished"
        );

        Ok(reporter.finish())
    }

    /// Create or replace one model's relation
    pub async fn materialize(&self, model: &CompiledModel) -> Result<(), ModelExecutionError> {
        let wrap = |source: EngineError| ModelExecutionError {
            model: model.name.clone(),
            source,
        };
        let relation = &model.relation;
        let kind = model.materialization.relation_kind();

        self.engine.create_schema(&relation.schema).await.map_err(wrap)?;

        if let Some(existing) = self.engine.relation_kind(relation).await.map_err(wrap)? {
            if existing != kind {
                tracing::debug!(relation = %relation, from = %existing, to = %kind, "replacing relation of another kind");
                self.engine.drop_relation(relation, existing).await.map_err(wrap)?;
            }
        }

        self.engine
            .create_relation_as(relation, kind, &model.sql)
            .await
            .map_err(wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrun_core::{Materialization, Relation, RelationKind};
    use modelrun_warehouse::{MockEngine, MockEngineBuilder};
    use std::path::PathBuf;

    fn compiled(name: &str, materialization: Materialization) -> CompiledModel {
        CompiledModel {
            name: name.to_string(),
            path: PathBuf::from(format!("models/{}.sql", name)),
            relation: Relation::new("main", name),
            materialization,
            sql: format!("select '{}' as name", name),
        }
    }

    #[tokio::test]
    async fn runs_models_in_order() {
        let engine = MockEngine::new();
        let models = vec![
            compiled("raw_orders", Materialization::Table),
            compiled("refined_orders", Materialization::View),
        ];

        let report = Executor::new(&engine).run(&models).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.summary.success, 2);
        let relations = engine.relations().await;
        assert_eq!(relations[&Relation::new("main", "raw_orders")], RelationKind::Table);
        assert_eq!(relations[&Relation::new("main", "refined_orders")], RelationKind::View);
    }

    #[tokio::test]
    async fn failure_skips_the_rest() {
        let engine = MockEngineBuilder::new()
            .with_failure(
                Relation::new("main", "b"),
                EngineError::QueryError("Binder Error: column not found".to_string()),
            )
            .build();
        let models = vec![
            compiled("a", Materialization::Table),
            compiled("b", Materialization::View),
            compiled("c", Materialization::View),
        ];

        let report = Executor::new(&engine).run(&models).await.unwrap();

        let statuses: Vec<RunStatus> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![RunStatus::Success, RunStatus::Error, RunStatus::Skipped]);
        assert!(report.results[1].error.as_ref().unwrap().contains("Binder Error"));

        // `a` stays materialized, `c` was never attempted
        let relations = engine.relations().await;
        assert!(relations.contains_key(&Relation::new("main", "a")));
        assert!(!relations.contains_key(&Relation::new("main", "c")));
    }

    #[tokio::test]
    async fn table_is_replaced_by_view() {
        let relation = Relation::new("main", "orders");
        let engine = MockEngineBuilder::new()
            .with_relation(relation.clone(), RelationKind::Table)
            .build();

        Executor::new(&engine)
            .materialize(&compiled("orders", Materialization::View))
            .await
            .unwrap();

        assert_eq!(engine.relation_kind(&relation).await.unwrap(), Some(RelationKind::View));
        let statements = engine.statements().await;
        assert_eq!(statements[1], "DROP TABLE IF EXISTS \"main\".\"orders\"");
    }

    #[tokio::test]
    async fn same_kind_is_not_dropped() {
        let relation = Relation::new("main", "orders");
        let engine = MockEngineBuilder::new()
            .with_relation(relation.clone(), RelationKind::Table)
            .build();

        Executor::new(&engine)
            .materialize(&compiled("orders", Materialization::Table))
            .await
            .unwrap();

        assert!(!engine.statements().await.iter().any(|s| s.starts_with("DROP")));
    }

    #[tokio::test]
    async fn diagnostics_for_failed_run() {
        let engine = MockEngineBuilder::new()
            .with_failure(Relation::new("main", "a"), EngineError::QueryError("boom".to_string()))
            .build();
        let models = vec![
            compiled("a", Materialization::Table),
            compiled("b", Materialization::View),
        ];

        let report = Executor::new(&engine).run(&models).await.unwrap();
        let diagnostics = failure_diagnostics(&report, &models);

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].code, DiagnosticCode::ModelExecutionError);
        assert_eq!(diagnostics[0].location.as_ref().unwrap().file, "models/a.sql");
        assert_eq!(diagnostics[0].impact, vec!["b".to_string()]);
        assert_eq!(diagnostics[1].code, DiagnosticCode::ModelSkipped);
        assert_eq!(diagnostics[1].severity, Severity::Warn);
    }

    #[tokio::test]
    async fn no_diagnostics_for_clean_run() {
        let engine = MockEngine::new();
        let models = vec![compiled("a", Materialization::View)];

        let report = Executor::new(&engine).run(&models).await.unwrap();
        assert!(failure_diagnostics(&report, &models).is_empty());
    }

    #[test]
    fn execution_error_diagnostic() {
        let err = ModelExecutionError {
            model: "b".to_string(),
            source: EngineError::QueryError("boom".to_string()),
        };
        assert_eq!(err.to_string(), "Model 'b' failed: Query failed: boom");

        let diagnostic = err.to_diagnostic(Some(std::path::Path::new("models/b.sql")));
        assert_eq!(diagnostic.code, DiagnosticCode::ModelExecutionError);
        assert_eq!(diagnostic.location.unwrap().file, "models/b.sql");
    }
}
