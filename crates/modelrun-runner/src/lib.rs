//! modelrun runner - materializes compiled models
//!
//! - Sequential, fail-fast executor
//! - Per-model run state and `run_results.json`
//! - Post-build validation checks

pub mod checks;
pub mod executor;
pub mod reporter;

pub use checks::{run_checks, CheckOutcome};
pub use executor::{failure_diagnostics, Executor, ModelExecutionError};
pub use reporter::{ModelState, ReporterError, RunReporter, RUN_RESULTS_FILE};
