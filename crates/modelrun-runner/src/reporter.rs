//! Run reporter
//!
//! Tracks every planned model through its run states and turns the outcome
//! into a [`RunReport`]:
//!
//! ```text
//! Pending -> Running -> Succeeded
//!                    -> Failed
//! Pending -> Skipped
//! ```
//!
//! Any other transition is rejected with [`ReporterError::InvalidTransition`].

use modelrun_core::{Materialization, Relation, RunReport, RunResult, RunStatus, RunSummary};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// File name of the persisted report inside the target directory
pub const RUN_RESULTS_FILE: &str = "run_results.json";

/// Run state of one model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl ModelState {
    fn can_transition_to(self, next: ModelState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReporterError {
    #[error("Invalid state transition for model '{model}': {from} -> {to}")]
    InvalidTransition {
        model: String,
        from: ModelState,
        to: ModelState,
    },

    #[error("Model '{0}' is not part of this run")]
    UnknownModel(String),

    #[error("Failed to write {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

#[derive(Debug)]
struct Entry {
    model: String,
    materialization: Materialization,
    relation: Relation,
    state: ModelState,
    started: Option<Instant>,
    duration: Duration,
    error: Option<String>,
}

/// Collects per-model outcomes for one run
#[derive(Debug)]
pub struct RunReporter {
    /// Entries in plan order
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    /// Entry indices in the order they started running
    attempted: Vec<usize>,
    started: Instant,
}

impl RunReporter {
    /// Start a run with every planned model pending
    pub fn new<'a, I>(planned: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Materialization, &'a Relation)>,
    {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for (model, materialization, relation) in planned {
            index.insert(model.to_string(), entries.len());
            entries.push(Entry {
                model: model.to_string(),
                materialization,
                relation: relation.clone(),
                state: ModelState::Pending,
                started: None,
                duration: Duration::ZERO,
                error: None,
            });
        }

        Self {
            entries,
            index,
            attempted: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn state(&self, model: &str) -> Option<ModelState> {
        self.index.get(model).map(|&i| self.entries[i].state)
    }

    pub fn start(&mut self, model: &str) -> Result<(), ReporterError> {
        let i = self.transition(model, ModelState::Running)?;
        self.entries[i].started = Some(Instant::now());
        self.attempted.push(i);
        Ok(())
    }

    pub fn succeed(&mut self, model: &str) -> Result<(), ReporterError> {
        let i = self.transition(model, ModelState::Succeeded)?;
        self.stop_clock(i);
        Ok(())
    }

    pub fn fail(&mut self, model: &str, error: impl Into<String>) -> Result<(), ReporterError> {
        let i = self.transition(model, ModelState::Failed)?;
        self.stop_clock(i);
        self.entries[i].error = Some(error.into());
        Ok(())
    }

    pub fn skip(&mut self, model: &str) -> Result<(), ReporterError> {
        self.transition(model, ModelState::Skipped)?;
        Ok(())
    }

    /// Skip every model still pending; returns how many were skipped
    pub fn skip_remaining(&mut self) -> usize {
        let mut skipped = 0;
        for entry in &mut self.entries {
            if entry.state == ModelState::Pending {
                entry.state = ModelState::Skipped;
                skipped += 1;
            }
        }
        skipped
    }

    /// Counts of the models that reached a terminal state so far
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for entry in &self.entries {
            if let Some(status) = run_status(entry.state) {
                summary.record(status);
            }
        }
        summary
    }

    /// Build the report: attempted models in execution order, then skipped
    /// models in plan order. Models still pending are reported as skipped.
    pub fn finish(mut self) -> RunReport {
        self.skip_remaining();
        let elapsed = self.started.elapsed().as_secs_f64();

        let skipped = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state == ModelState::Skipped)
            .map(|(i, _)| i);
        let order: Vec<usize> = self.attempted.iter().copied().chain(skipped).collect();

        let results = order
            .into_iter()
            .map(|i| {
                let entry = &self.entries[i];
                RunResult {
                    model: entry.model.clone(),
                    // Running only if the caller never finished the model
                    status: run_status(entry.state).unwrap_or(RunStatus::Error),
                    materialization: entry.materialization,
                    relation: entry.relation.to_string(),
                    duration_secs: entry.duration.as_secs_f64(),
                    error: entry.error.clone(),
                }
            })
            .collect();

        RunReport::from_results(results, elapsed)
    }

    /// Write `run_results.json` into `target_dir`
    pub fn write(report: &RunReport, target_dir: &Path) -> Result<PathBuf, ReporterError> {
        let path = target_dir.join(RUN_RESULTS_FILE);
        let io_error = |e: std::io::Error| ReporterError::Io {
            path: path.clone(),
            message: e.to_string(),
        };

        std::fs::create_dir_all(target_dir).map_err(io_error)?;
        report.save_to_file(&path).map_err(io_error)?;

        tracing::debug!(path = %path.display(), "wrote run results");
        Ok(path)
    }

    fn transition(&mut self, model: &str, next: ModelState) -> Result<usize, ReporterError> {
        let i = *self
            .index
            .get(model)
            .ok_or_else(|| ReporterError::UnknownModel(model.to_string()))?;

        let entry = &mut self.entries[i];
        if !entry.state.can_transition_to(next) {
            return Err(ReporterError::InvalidTransition {
                model: model.to_string(),
                from: entry.state,
                to: next,
            });
        }

        entry.state = next;
        Ok(i)
    }

    fn stop_clock(&mut self, i: usize) {
        let entry = &mut self.entries[i];
        if let Some(started) = entry.started {
            entry.duration = started.elapsed();
        }
    }
}

fn run_status(state: ModelState) -> Option<RunStatus> {
    match state {
        ModelState::Succeeded => Some(RunStatus::Success),
        ModelState::Failed => Some(RunStatus::Error),
        ModelState::Skipped => Some(RunStatus::Skipped),
        ModelState::Pending | ModelState::Running => None,
    }
}
