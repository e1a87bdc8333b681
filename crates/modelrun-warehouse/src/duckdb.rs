//! DuckDB engine
//!
//! Opens a local database file, an in-memory database (`:memory:`) or a
//! MotherDuck database (`md:<name>`). MotherDuck credentials are picked up by
//! DuckDB itself from `MOTHERDUCK_TOKEN`; they are never read or logged here.

use crate::adapter::{Engine, EngineError};
use ::duckdb::types::ValueRef;
use ::duckdb::{params, Connection};
use modelrun_core::{Relation, RelationKind};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

const IN_MEMORY: &str = ":memory:";
const MOTHERDUCK_PREFIX: &str = "md:";

impl From<::duckdb::Error> for EngineError {
    fn from(error: ::duckdb::Error) -> Self {
        EngineError::QueryError(error.to_string())
    }
}

pub struct DuckDbEngine {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbEngine {
    /// Open a connection for a target string
    pub fn open(target: &str) -> Result<Self, EngineError> {
        let conn = if target == IN_MEMORY {
            tracing::debug!("opening in-memory DuckDB database");
            Connection::open_in_memory()
        } else if target.starts_with(MOTHERDUCK_PREFIX) {
            // The connection string may carry a token parameter
            tracing::info!("connecting to MotherDuck");
            Connection::open(target)
        } else {
            let path = Path::new(target);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EngineError::ConfigError(format!("Cannot create {}: {}", parent.display(), e))
                })?;
            }
            tracing::debug!(path = %path.display(), "opening DuckDB database");
            Connection::open(path)
        }
        .map_err(|e| EngineError::ConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        Self::open(IN_MEMORY)
    }
}

#[async_trait::async_trait]
impl Engine for DuckDbEngine {
    fn name(&self) -> &'static str {
        "DuckDB"
    }

    async fn execute(&self, sql: &str) -> Result<(), EngineError> {
        let conn = self.conn.lock();
        conn.execute_batch(sql)?;
        Ok(())
    }

    async fn query_scalar(&self, sql: &str) -> Result<Value, EngineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params![])?;

        match rows.next()? {
            Some(row) => row_value_to_json(row.get_ref(0)?),
            None => Err(EngineError::EmptyResult(sql.trim().to_string())),
        }
    }

    async fn relation_kind(&self, relation: &Relation) -> Result<Option<RelationKind>, EngineError> {
        let conn = self.conn.lock();
        // information_schema spans every attached database (all of them on `md:`)
        let sql = "SELECT table_type FROM information_schema.tables \
                   WHERE table_catalog = current_database() AND table_schema = ? AND table_name = ?";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params![relation.schema, relation.name])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let table_type: String = row.get(0)?;
        Ok(Some(match table_type.as_str() {
            "VIEW" => RelationKind::View,
            _ => RelationKind::Table,
        }))
    }
}

fn row_value_to_json(value: ValueRef<'_>) -> Result<Value, EngineError> {
    let json_val = match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => json!(i),
        ValueRef::SmallInt(i) => json!(i),
        ValueRef::Int(i) => json!(i),
        ValueRef::BigInt(i) => json!(i),
        ValueRef::HugeInt(i) => json!(i64::try_from(i).map_err(|_| {
            EngineError::QueryError(format!("HUGEINT value {} does not fit in 64 bits", i))
        })?),
        ValueRef::UTinyInt(i) => json!(i),
        ValueRef::USmallInt(i) => json!(i),
        ValueRef::UInt(i) => json!(i),
        ValueRef::UBigInt(i) => json!(i),
        ValueRef::Float(f) => json!(f),
        ValueRef::Double(f) => json!(f),
        ValueRef::Decimal(d) => json!(d.to_string()),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        other => Value::String(format!("{:?}", other)),
    };

    Ok(json_val)
}
