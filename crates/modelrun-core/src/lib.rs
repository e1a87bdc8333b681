//! modelrun core
//!
//! Domain model shared by every modelrun crate: models, relations,
//! project configuration, validation errors, diagnostics and run reports.
//! Diagnostic codes are part of the public output - never rename them.

pub mod diagnostic;
pub mod error;
pub mod model;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
pub use error::ValidationError;
pub use model::{Materialization, Model, ModelConfig, Reference, Relation, RelationKind};
pub use report::{RunReport, RunResult, RunStatus, RunSummary, ReportVersion};
pub use config::{Config, ConfigError, TargetConfig, ModelDefaults, SourceConfig, CheckConfig};
