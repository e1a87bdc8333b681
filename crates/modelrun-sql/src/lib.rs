//! Static analysis of model source text
//!
//! This crate handles:
//! - Extracting `ref()` and `source()` references from templated SQL
//! - Reading the `config()` directive without evaluating the template
//! - Parsing compiled SQL with sqlparser to catch obvious mistakes early
//!
//! Nothing here renders templates or talks to an engine.

pub mod refs;
pub mod directive;
pub mod parser;

pub use refs::ReferenceExtractor;
pub use directive::{ConfigDirective, DirectiveError};
pub use parser::{ParseError, ParsedSql, SqlParser};
