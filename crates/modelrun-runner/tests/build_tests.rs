//! End-to-end build tests: load, compile and execute a project
//!
//! DuckDB-backed tests run with:
//!
//! ```bash
//! cargo test -p modelrun-runner --features duckdb --test build_tests
//! ```

use modelrun_core::{Config, Materialization, ModelDefaults, Relation, RelationKind, RunStatus};
use modelrun_jinja::ModelCompiler;
use modelrun_project::{ModelRegistry, Project};
use modelrun_runner::{Executor, RunReporter, RUN_RESULTS_FILE};
use modelrun_warehouse::{Engine, EngineError, MockEngine};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// =============================================================================
// Helper Functions
// =============================================================================

fn tutorial_config() -> Config {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/tutorial-project/modelrun.toml");
    let mut config = Config::from_file(&path).unwrap();
    config.target.path = ":memory:".to_string();
    config
}

fn project_from(sources: &[(&str, &str)], defaults: ModelDefaults) -> Project {
    let config = Config {
        models: defaults,
        ..Config::default()
    };
    let registry = ModelRegistry::from_sources(sources.iter().copied(), &config.models).unwrap();
    Project::from_registry(config, registry).unwrap()
}

async fn build(project: &Project, engine: &dyn Engine) -> modelrun_core::RunReport {
    let plan = project.build_plan(None).unwrap();
    let compiled = ModelCompiler::new(&project.config)
        .compile_plan(project, &plan)
        .unwrap();
    Executor::new(engine).run(&compiled).await.unwrap()
}

// =============================================================================
// Mock Engine Tests
// =============================================================================

#[tokio::test]
async fn test_tutorial_project_builds_in_order() {
    let project = Project::load(tutorial_config()).unwrap();
    let engine = MockEngine::new();

    let report = build(&project, &engine).await;

    let models: Vec<&str> = report.results.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(models, vec!["raw_orders", "refined_orders", "sales_summary"]);
    assert!(report.is_success());

    let relations = engine.relations().await;
    assert_eq!(relations[&Relation::new("main", "raw_orders")], RelationKind::Table);
    assert_eq!(relations[&Relation::new("main", "refined_orders")], RelationKind::View);
    assert_eq!(relations[&Relation::new("main", "sales_summary")], RelationKind::Table);
}

#[tokio::test]
async fn test_compiled_sql_reaches_engine() {
    let project = Project::load(tutorial_config()).unwrap();
    let engine = MockEngine::new();

    build(&project, &engine).await;

    let statements = engine.statements().await;
    let refined = statements
        .iter()
        .find(|s| s.starts_with("CREATE OR REPLACE VIEW \"main\".\"refined_orders\""))
        .unwrap();
    assert!(refined.contains("from \"main\".\"raw_orders\""));
    assert!(refined.contains("amount > 0"));
    assert!(!refined.contains("{{"));
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let project = Project::load(tutorial_config()).unwrap();
    let engine = MockEngine::new();

    let first = build(&project, &engine).await;
    let second = build(&project, &engine).await;

    assert_eq!(first.status_pattern(), second.status_pattern());
}

#[tokio::test]
async fn test_failure_pattern_is_idempotent() {
    let project = Project::load(tutorial_config()).unwrap();
    let engine = MockEngine::new();
    engine
        .fail_on(
            Relation::new("main", "refined_orders"),
            EngineError::QueryError("Binder Error: Referenced column not found".to_string()),
        )
        .await;

    let first = build(&project, &engine).await;
    let second = build(&project, &engine).await;

    assert_eq!(
        first.status_pattern(),
        vec![
            ("raw_orders".to_string(), RunStatus::Success),
            ("refined_orders".to_string(), RunStatus::Error),
            ("sales_summary".to_string(), RunStatus::Skipped),
        ]
    );
    assert_eq!(first.status_pattern(), second.status_pattern());
}

#[tokio::test]
async fn test_selected_model_builds_ancestors_only() {
    let project = Project::load(tutorial_config()).unwrap();
    let engine = MockEngine::new();

    let plan = project.build_plan(Some("refined_orders")).unwrap();
    let compiled = ModelCompiler::new(&project.config)
        .compile_plan(&project, &plan)
        .unwrap();
    let report = Executor::new(&engine).run(&compiled).await.unwrap();

    let models: Vec<&str> = report.results.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(models, vec!["raw_orders", "refined_orders"]);
}

#[tokio::test]
async fn test_table_to_view_switch() {
    let engine = MockEngine::new();

    let as_table = project_from(
        &[("orders", "select 1 as id")],
        ModelDefaults {
            materialized: Materialization::Table,
            schema: None,
        },
    );
    build(&as_table, &engine).await;
    assert_eq!(
        engine.relation_kind(&Relation::new("main", "orders")).await.unwrap(),
        Some(RelationKind::Table)
    );

    let as_view = project_from(&[("orders", "select 1 as id")], ModelDefaults::default());
    let report = build(&as_view, &engine).await;

    assert!(report.is_success());
    assert_eq!(
        engine.relation_kind(&Relation::new("main", "orders")).await.unwrap(),
        Some(RelationKind::View)
    );
}

#[tokio::test]
async fn test_run_results_written() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::load(tutorial_config()).unwrap();
    let report = build(&project, &MockEngine::new()).await;

    let path = RunReporter::write(&report, dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), RUN_RESULTS_FILE);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["summary"]["success"], 3);
    assert_eq!(json["results"][2]["relation"], "main.sales_summary");
}

// =============================================================================
// DuckDB Engine Tests
// =============================================================================

#[cfg(feature = "duckdb")]
mod duckdb_engine {
    use super::*;
    use pretty_assertions::assert_eq;
    use modelrun_runner::run_checks;
    use modelrun_warehouse::DuckDbEngine;

    #[tokio::test]
    async fn test_tutorial_build_and_checks() {
        let config = tutorial_config();
        let project = Project::load(config.clone()).unwrap();
        let engine = DuckDbEngine::in_memory().unwrap();

        let report = build(&project, &engine).await;
        assert!(report.is_success(), "{:?}", report.results);

        let outcomes = run_checks(&engine, &config.checks).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.passed()), "{:?}", outcomes);
    }

    #[tokio::test]
    async fn test_table_to_view_switch_in_duckdb() {
        let engine = DuckDbEngine::in_memory().unwrap();

        let as_table = project_from(
            &[("orders", "select 1 as id")],
            ModelDefaults {
                materialized: Materialization::Table,
                schema: None,
            },
        );
        assert!(build(&as_table, &engine).await.is_success());

        let as_view = project_from(&[("orders", "select 2 as id")], ModelDefaults::default());
        assert!(build(&as_view, &engine).await.is_success());

        let relation = Relation::new("main", "orders");
        assert_eq!(engine.relation_kind(&relation).await.unwrap(), Some(RelationKind::View));
        assert_eq!(
            engine.query_scalar("select id from \"main\".\"orders\"").await.unwrap(),
            serde_json::json!(2)
        );
    }

    #[tokio::test]
    async fn test_broken_model_skips_dependents() {
        let engine = DuckDbEngine::in_memory().unwrap();
        let project = project_from(
            &[
                ("a", "select 1 as id"),
                ("b", "select missing_column from {{ ref('a') }}"),
                ("c", "select * from {{ ref('b') }}"),
            ],
            ModelDefaults::default(),
        );

        let report = build(&project, &engine).await;
        assert_eq!(report.summary.success, 1);
        assert_eq!(report.summary.error, 1);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.results[2].model, "c");
    }
}
