//! Template compilation for SQL models
//!
//! This crate handles:
//! - Rendering model templates to concrete SQL with MiniJinja
//! - Substituting `ref()` / `source()` calls with materialized relation names
//! - Exposing `var()`, `env_var()`, `config()`, `this` and `target`
//! - Error reporting with diagnostics

pub mod compiler;
pub mod context;
pub mod functions;

pub use compiler::{CompiledModel, CompileError, ModelCompiler};
pub use context::{RenderContext, TargetContext};
