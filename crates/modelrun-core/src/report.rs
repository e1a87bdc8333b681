//! Outcome of a build, persisted as `run_results.json`
//!
//! The file carries a `major.minor` version; readers should reject a
//! major version they do not know.

use serde::{Deserialize, Serialize};
use crate::model::Materialization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    pub major: u32,
    pub minor: u32,
}

impl ReportVersion {
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Terminal outcome of one model in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    Skipped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result for a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub model: String,

    pub status: RunStatus,

    pub materialization: Materialization,

    /// Relation the model was (or would have been) written to
    pub relation: String,

    /// Wall time spent on the model; zero when skipped
    pub duration_secs: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts per terminal status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.success + self.error + self.skipped
    }

    pub fn record(&mut self, status: RunStatus) {
        match status {
            RunStatus::Success => self.success += 1,
            RunStatus::Error => self.error += 1,
            RunStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Persisted outcome of a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub version: ReportVersion,

    /// RFC 3339, UTC
    pub timestamp: String,

    pub elapsed_secs: f64,

    pub summary: RunSummary,

    /// Attempted models in execution order, then skipped models in plan order
    pub results: Vec<RunResult>,
}

impl RunReport {
    /// Create a report from results, deriving the summary
    pub fn from_results(results: Vec<RunResult>, elapsed_secs: f64) -> Self {
        let mut summary = RunSummary::default();
        for result in &results {
            summary.record(result.status);
        }

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            elapsed_secs,
            summary,
            results,
        }
    }

    /// True when no model failed or was skipped
    pub fn is_success(&self) -> bool {
        self.summary.error == 0 && self.summary.skipped == 0
    }

    /// Status pattern without timing, for comparing runs
    pub fn status_pattern(&self) -> Vec<(String, RunStatus)> {
        self.results
            .iter()
            .map(|r| (r.model.clone(), r.status))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the pretty-printed report to `path`, replacing any previous run
    pub fn save_to_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
