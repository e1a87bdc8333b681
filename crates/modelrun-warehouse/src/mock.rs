//! Mock engine for testing
//!
//! Keeps relations in memory and records every statement it is asked to
//! run, without touching a real database. It mirrors the catalog rules the
//! executor relies on: a schema must exist before relations are created in
//! it, and `CREATE OR REPLACE` / `DROP` refuse to act on a relation of the
//! other kind.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modelrun_warehouse::{Engine, EngineError, MockEngine};
//! use modelrun_core::Relation;
//!
//! let engine = MockEngine::new();
//! engine
//!     .fail_on(Relation::new("main", "broken"), EngineError::QueryError("boom".into()))
//!     .await;
//! ```

use crate::adapter::{create_relation_sql, create_schema_sql, drop_relation_sql, Engine, EngineError};
use modelrun_core::{Relation, RelationKind};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory engine
///
/// Clones share state, so a test can hand one clone to the executor and
/// inspect the other afterwards.
#[derive(Clone)]
pub struct MockEngine {
    /// Existing relations and their kind
    relations: Arc<RwLock<BTreeMap<Relation, RelationKind>>>,

    schemas: Arc<RwLock<BTreeSet<String>>>,

    /// Every statement in the order it was received
    statements: Arc<RwLock<Vec<String>>>,

    /// Errors returned when creating specific relations
    failures: Arc<RwLock<HashMap<Relation, EngineError>>>,

    /// Canned results for `query_scalar`, keyed by trimmed SQL
    scalars: Arc<RwLock<HashMap<String, serde_json::Value>>>,

    /// Simulate statement latency (milliseconds)
    latency_ms: u64,
}

impl MockEngine {
    /// Create an empty engine with the `main` schema
    pub fn new() -> Self {
        MockEngineBuilder::new().build()
    }

    /// Make every later creation of `relation` fail with `error`
    pub async fn fail_on(&self, relation: Relation, error: EngineError) {
        self.failures.write().await.insert(relation, error);
    }

    /// Stop failing on `relation`
    pub async fn clear_failure(&self, relation: &Relation) {
        self.failures.write().await.remove(relation);
    }

    /// Answer `sql` with `value` from `query_scalar`
    pub async fn set_scalar(&self, sql: &str, value: serde_json::Value) {
        self.scalars.write().await.insert(sql.trim().to_string(), value);
    }

    /// Snapshot of the recorded statements
    pub async fn statements(&self) -> Vec<String> {
        self.statements.read().await.clone()
    }

    pub async fn clear_statements(&self) {
        self.statements.write().await.clear();
    }

    /// Snapshot of the existing relations
    pub async fn relations(&self) -> BTreeMap<Relation, RelationKind> {
        self.relations.read().await.clone()
    }

    pub async fn has_schema(&self, schema: &str) -> bool {
        self.schemas.read().await.contains(schema)
    }

    async fn record(&self, sql: String) {
        tracing::trace!(sql = %sql, "mock engine statement");
        self.statements.write().await.push(sql);
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn execute(&self, sql: &str) -> Result<(), EngineError> {
        self.simulate_latency().await;
        self.record(sql.to_string()).await;
        Ok(())
    }

    async fn query_scalar(&self, sql: &str) -> Result<serde_json::Value, EngineError> {
        self.simulate_latency().await;
        self.record(sql.to_string()).await;

        self.scalars
            .read()
            .await
            .get(sql.trim())
            .cloned()
            .ok_or_else(|| EngineError::EmptyResult(sql.trim().to_string()))
    }

    async fn relation_kind(&self, relation: &Relation) -> Result<Option<RelationKind>, EngineError> {
        Ok(self.relations.read().await.get(relation).copied())
    }

    async fn create_schema(&self, schema: &str) -> Result<(), EngineError> {
        self.simulate_latency().await;
        self.record(create_schema_sql(schema)).await;
        self.schemas.write().await.insert(schema.to_string());
        Ok(())
    }

    async fn create_relation_as(
        &self,
        relation: &Relation,
        kind: RelationKind,
        sql: &str,
    ) -> Result<(), EngineError> {
        self.simulate_latency().await;
        self.record(create_relation_sql(relation, kind, sql)).await;

        if let Some(error) = self.failures.read().await.get(relation) {
            return Err(error.clone());
        }

        if !self.schemas.read().await.contains(&relation.schema) {
            return Err(EngineError::QueryError(format!(
                "Catalog Error: Schema with name {} does not exist!",
                relation.schema
            )));
        }

        let mut relations = self.relations.write().await;
        match relations.get(relation) {
            Some(existing) if *existing != kind => Err(EngineError::QueryError(format!(
                "Catalog Error: Existing object {} is of type {}, trying to replace with type {}",
                relation, existing, kind
            ))),
            _ => {
                relations.insert(relation.clone(), kind);
                Ok(())
            }
        }
    }

    async fn drop_relation(&self, relation: &Relation, kind: RelationKind) -> Result<(), EngineError> {
        self.simulate_latency().await;
        self.record(drop_relation_sql(relation, kind)).await;

        let mut relations = self.relations.write().await;
        match relations.get(relation) {
            Some(existing) if *existing != kind => Err(EngineError::QueryError(format!(
                "Catalog Error: Existing object {} is of type {}, trying to drop type {}",
                relation, existing, kind
            ))),
            Some(_) => {
                relations.remove(relation);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Builder for a pre-populated `MockEngine`
///
/// # Example
///
/// ```rust,ignore
/// let engine = MockEngineBuilder::new()
///     .with_relation(Relation::new("main", "raw_orders"), RelationKind::Table)
///     .with_scalar("select count(*) from main.raw_orders", json!(4))
///     .build();
/// ```
pub struct MockEngineBuilder {
    relations: BTreeMap<Relation, RelationKind>,
    schemas: BTreeSet<String>,
    failures: HashMap<Relation, EngineError>,
    scalars: HashMap<String, serde_json::Value>,
    latency_ms: u64,
}

impl MockEngineBuilder {
    pub fn new() -> Self {
        Self {
            relations: BTreeMap::new(),
            schemas: BTreeSet::from(["main".to_string()]),
            failures: HashMap::new(),
            scalars: HashMap::new(),
            latency_ms: 0,
        }
    }

    /// Add an existing relation (its schema is created too)
    pub fn with_relation(mut self, relation: Relation, kind: RelationKind) -> Self {
        self.schemas.insert(relation.schema.clone());
        self.relations.insert(relation, kind);
        self
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schemas.insert(schema.to_string());
        self
    }

    pub fn with_failure(mut self, relation: Relation, error: EngineError) -> Self {
        self.failures.insert(relation, error);
        self
    }

    pub fn with_scalar(mut self, sql: &str, value: serde_json::Value) -> Self {
        self.scalars.insert(sql.trim().to_string(), value);
        self
    }

    /// Configure latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn build(self) -> MockEngine {
        MockEngine {
            relations: Arc::new(RwLock::new(self.relations)),
            schemas: Arc::new(RwLock::new(self.schemas)),
            statements: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(self.failures)),
            scalars: Arc::new(RwLock::new(self.scalars)),
            latency_ms: self.latency_ms,
        }
    }
}

impl Default for MockEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_inspect_relation() {
        let engine = MockEngine::new();
        let relation = Relation::new("main", "raw_orders");

        assert_eq!(engine.relation_kind(&relation).await.unwrap(), None);

        engine
            .create_relation_as(&relation, RelationKind::Table, "select 1 as id")
            .await
            .unwrap();

        assert_eq!(engine.relation_kind(&relation).await.unwrap(), Some(RelationKind::Table));
        assert_eq!(engine.statements().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_schema_is_an_error() {
        let engine = MockEngine::new();
        let relation = Relation::new("staging", "orders");

        let result = engine.create_relation_as(&relation, RelationKind::View, "select 1").await;
        assert!(matches!(result, Err(EngineError::QueryError(_))));

        engine.create_schema("staging").await.unwrap();
        assert!(engine.has_schema("staging").await);
        assert!(engine.create_relation_as(&relation, RelationKind::View, "select 1").await.is_ok());
    }

    #[tokio::test]
    async fn test_replace_with_other_kind_is_rejected() {
        let relation = Relation::new("main", "orders");
        let engine = MockEngineBuilder::new()
            .with_relation(relation.clone(), RelationKind::Table)
            .build();

        let result = engine.create_relation_as(&relation, RelationKind::View, "select 1").await;
        assert!(matches!(result, Err(EngineError::QueryError(ref msg)) if msg.contains("type table")));

        // Dropping with the wrong kind fails too
        assert!(engine.drop_relation(&relation, RelationKind::View).await.is_err());

        engine.drop_relation(&relation, RelationKind::Table).await.unwrap();
        engine.create_relation_as(&relation, RelationKind::View, "select 1").await.unwrap();
        assert_eq!(engine.relation_kind(&relation).await.unwrap(), Some(RelationKind::View));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let engine = MockEngine::new();
        let relation = Relation::new("main", "broken");
        engine
            .fail_on(relation.clone(), EngineError::QueryError("Parser Error: syntax error".to_string()))
            .await;

        let result = engine.create_relation_as(&relation, RelationKind::Table, "select").await;
        assert_eq!(
            result,
            Err(EngineError::QueryError("Parser Error: syntax error".to_string()))
        );
        assert_eq!(engine.relation_kind(&relation).await.unwrap(), None);

        engine.clear_failure(&relation).await;
        assert!(engine.create_relation_as(&relation, RelationKind::Table, "select 1").await.is_ok());
    }

    #[tokio::test]
    async fn test_query_scalar() {
        let engine = MockEngineBuilder::new()
            .with_scalar("select count(*) from main.orders", json!(4))
            .build();

        assert_eq!(engine.query_scalar("  select count(*) from main.orders\n").await.unwrap(), json!(4));
        assert!(matches!(
            engine.query_scalar("select 1").await,
            Err(EngineError::EmptyResult(_))
        ));
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let engine = MockEngine::new();
        let cloned = engine.clone();

        cloned.execute("select 1").await.unwrap();
        assert_eq!(engine.statements().await, vec!["select 1".to_string()]);

        engine.clear_statements().await;
        assert!(cloned.statements().await.is_empty());
    }

    #[tokio::test]
    async fn test_name() {
        assert_eq!(MockEngine::new().name(), "Mock");
    }
}
