//! Execution engines for materializing models
//!
//! ## Features
//!
//! - `duckdb` - embedded DuckDB (local file, `:memory:` or MotherDuck `md:`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use modelrun_warehouse::{DuckDbEngine, Engine};
//! use modelrun_core::{Relation, RelationKind};
//!
//! let engine = DuckDbEngine::open("tutorial.duckdb")?;
//! let relation = Relation::new("main", "raw_orders");
//! engine.create_schema("main").await?;
//! engine.create_relation_as(&relation, RelationKind::Table, "select 1 as id").await?;
//! ```

pub mod adapter;
pub mod mock;

#[cfg(feature = "duckdb")]
pub mod duckdb;

pub use adapter::{Engine, EngineError};
pub use mock::{MockEngine, MockEngineBuilder};

#[cfg(feature = "duckdb")]
pub use crate::duckdb::DuckDbEngine;
