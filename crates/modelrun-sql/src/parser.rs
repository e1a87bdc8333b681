//! Compiled SQL checks
//!
//! Compiled model bodies are parsed with sqlparser's DuckDB dialect before
//! they are wrapped in `CREATE ... AS`. Problems are reported as warnings
//! only; the engine has the final say on what it accepts.

use modelrun_core::{Diagnostic, DiagnosticCode, Location, Severity};
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, DuckDbDialect, GenericDialect};
use sqlparser::parser::{Parser, ParserError};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// DuckDB dialect, matching the default engine
    pub fn new() -> Self {
        Self {
            dialect: Box::new(DuckDbDialect {}),
        }
    }

    pub fn generic() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    pub fn parse(&self, sql: &str, file_path: Option<&Path>) -> Result<ParsedSql, ParseError> {
        let file_path = file_path.map(Path::to_path_buf);
        Parser::parse_sql(&*self.dialect, sql)
            .map(|statements| ParsedSql { statements, file_path: file_path.clone() })
            .map_err(|source| ParseError { source, file_path })
    }

    /// Warnings for a compiled model body; empty when it is a single query
    pub fn check_model_body(&self, model: &str, sql: &str, file_path: Option<&Path>) -> Vec<Diagnostic> {
        let parsed = match self.parse(sql, file_path) {
            Ok(parsed) => parsed,
            Err(e) => return vec![e.to_diagnostic()],
        };

        if parsed.statement_count() == 1 && parsed.is_query() {
            return Vec::new();
        }

        let mut diag = Diagnostic::new(
            DiagnosticCode::SqlNotAQuery,
            Severity::Warn,
            format!(
                "Model '{}' should compile to a single SELECT, found {} statement(s)",
                model,
                parsed.statement_count()
            ),
        );
        if let Some(path) = file_path {
            diag = diag.with_location(Location::new(path.display().to_string()));
        }
        vec![diag]
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ParsedSql {
    pub statements: Vec<Statement>,
    pub file_path: Option<PathBuf>,
}

impl ParsedSql {
    /// True when the first statement is a query (SELECT, WITH, VALUES ...)
    pub fn is_query(&self) -> bool {
        matches!(self.statements.first(), Some(Statement::Query(_)))
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("SQL parse error: {source}")]
pub struct ParseError {
    pub source: ParserError,
    pub file_path: Option<PathBuf>,
}

impl ParseError {
    /// Line reported by the parser, if any (1-based)
    pub fn line(&self) -> Option<usize> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| Regex::new(r"Line: (\d+)").expect("valid line regex"));

        pattern
            .captures(&self.source.to_string())
            .and_then(|caps| caps[1].parse().ok())
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::new(
            DiagnosticCode::SqlParseError,
            Severity::Warn,
            format!("Failed to parse compiled SQL: {}", self.source),
        );

        match (&self.file_path, self.line()) {
            (Some(path), Some(line)) => diag.with_location(Location::with_line(path.display().to_string(), line)),
            (Some(path), None) => diag.with_location(Location::new(path.display().to_string())),
            (None, _) => diag,
        }
    }
}
