//! Diagnostics shared by every stage of a build
//!
//! Codes serialize as SCREAMING_SNAKE_CASE strings and are matched on by
//! tooling that reads `modelrun` output, so existing codes keep their names.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    DuplicateModel,
    UnresolvedReference,
    CycleDetected,
    /// Bad `config()` directive or project setting
    InvalidConfig,
    /// Selection names a model that does not exist
    UnknownModel,
    /// A configured model directory is missing
    ModelPathNotFound,
    /// A model file or directory could not be read
    ProjectReadError,

    TemplateRenderError,
    SqlParseError,
    /// Compiled SQL is not exactly one query
    SqlNotAQuery,

    ModelExecutionError,
    /// Not attempted because an earlier model failed
    ModelSkipped,
    CheckFailed,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateModel => "DUPLICATE_MODEL",
            Self::UnresolvedReference => "UNRESOLVED_REFERENCE",
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::UnknownModel => "UNKNOWN_MODEL",
            Self::ModelPathNotFound => "MODEL_PATH_NOT_FOUND",
            Self::ProjectReadError => "PROJECT_READ_ERROR",
            Self::TemplateRenderError => "TEMPLATE_RENDER_ERROR",
            Self::SqlParseError => "SQL_PARSE_ERROR",
            Self::SqlNotAQuery => "SQL_NOT_A_QUERY",
            Self::ModelExecutionError => "MODEL_EXECUTION_ERROR",
            Self::ModelSkipped => "MODEL_SKIPPED",
            Self::CheckFailed => "CHECK_FAILED",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    /// Reported, does not fail the command
    Warn,
    /// Fails the command
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// Model file and, when known, the 1-based line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Location {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
        }
    }

    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => f.write_str(&self.file),
        }
    }
}

/// A problem found while loading, compiling or running a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// Expected side of a comparison (failed checks)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    /// Models involved: cycle members, models skipped after a failure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub impact: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            expected: None,
            actual: None,
            impact: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn with_impact(mut self, impact: Vec<String>) -> Self {
        self.impact = impact;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}
