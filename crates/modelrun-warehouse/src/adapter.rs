//! Engine trait for materializing relations

use modelrun_core::{Relation, RelationKind};

/// Errors raised by an execution engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Query returned no rows: {0}")]
    EmptyResult(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// `CREATE SCHEMA IF NOT EXISTS "schema"`
pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", modelrun_core::model::quote_ident(schema))
}

/// `CREATE OR REPLACE TABLE|VIEW "schema"."name" AS <sql>`
pub fn create_relation_sql(relation: &Relation, kind: RelationKind, sql: &str) -> String {
    let keyword = match kind {
        RelationKind::Table => "TABLE",
        RelationKind::View => "VIEW",
    };
    format!("CREATE OR REPLACE {} {} AS\n{}", keyword, relation.quoted(), sql)
}

/// `DROP TABLE|VIEW IF EXISTS "schema"."name"`
pub fn drop_relation_sql(relation: &Relation, kind: RelationKind) -> String {
    let keyword = match kind {
        RelationKind::Table => "TABLE",
        RelationKind::View => "VIEW",
    };
    format!("DROP {} IF EXISTS {}", keyword, relation.quoted())
}

/// A database that models are materialized into
///
/// Statements are awaited one at a time by the executor; implementations
/// only need to be safe to share, not to run statements concurrently.
#[async_trait::async_trait]
pub trait Engine: Send + Sync {
    /// Get the engine name (e.g., "DuckDB")
    fn name(&self) -> &'static str;

    /// Run a single statement, discarding any result rows
    async fn execute(&self, sql: &str) -> Result<(), EngineError>;

    /// First column of the first row, as JSON
    async fn query_scalar(&self, sql: &str) -> Result<serde_json::Value, EngineError>;

    /// Kind of the existing relation, or `None` if it does not exist
    async fn relation_kind(&self, relation: &Relation) -> Result<Option<RelationKind>, EngineError>;

    async fn create_schema(&self, schema: &str) -> Result<(), EngineError> {
        self.execute(&create_schema_sql(schema)).await
    }

    async fn create_relation_as(
        &self,
        relation: &Relation,
        kind: RelationKind,
        sql: &str,
    ) -> Result<(), EngineError> {
        self.execute(&create_relation_sql(relation, kind, sql)).await
    }

    async fn drop_relation(&self, relation: &Relation, kind: RelationKind) -> Result<(), EngineError> {
        self.execute(&drop_relation_sql(relation, kind)).await
    }
}
