//! Static validation errors
//!
//! Everything here is detected before the engine is touched. A run that
//! hits one of these never mutates the target.

use crate::diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Duplicate model '{name}': defined in {} and {}", .first.display(), .second.display())]
    DuplicateModel {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Model '{model}' references '{reference}', which is neither a model nor a registered source")]
    UnresolvedReference {
        model: String,
        reference: String,
    },

    #[error("Cycle detected: {}", .cycle.join(" -> "))]
    CycleDetected {
        /// Closed path, first element repeated at the end
        cycle: Vec<String>,
    },

    #[error("Invalid config in model '{model}': {message}")]
    InvalidConfig {
        model: String,
        message: String,
    },

    #[error("Model '{0}' not found")]
    UnknownModel(String),

    #[error("Model path not found: {}", .0.display())]
    ModelPathNotFound(PathBuf),

    #[error("Failed to read {}: {message}", .path.display())]
    Io {
        path: PathBuf,
        message: String,
    },
}

impl ValidationError {
    /// Names of the models this error is about
    pub fn models(&self) -> Vec<&str> {
        match self {
            Self::DuplicateModel { name, .. } => vec![name.as_str()],
            Self::UnresolvedReference { model, .. } => vec![model.as_str()],
            Self::CycleDetected { cycle } => {
                // Closed path repeats the first member
                let open = if cycle.len() > 1 { cycle.len() - 1 } else { cycle.len() };
                cycle[..open].iter().map(String::as_str).collect()
            }
            Self::InvalidConfig { model, .. } => vec![model.as_str()],
            Self::UnknownModel(name) => vec![name.as_str()],
            Self::ModelPathNotFound(_) | Self::Io { .. } => Vec::new(),
        }
    }

    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::DuplicateModel { .. } => DiagnosticCode::DuplicateModel,
            Self::UnresolvedReference { .. } => DiagnosticCode::UnresolvedReference,
            Self::CycleDetected { .. } => DiagnosticCode::CycleDetected,
            Self::InvalidConfig { .. } => DiagnosticCode::InvalidConfig,
            Self::ModelPathNotFound(_) => DiagnosticCode::ModelPathNotFound,
            Self::Io { .. } => DiagnosticCode::ProjectReadError,
            Self::UnknownModel(_) => DiagnosticCode::UnknownModel,
        }
    }

    /// Convert to a diagnostic for display
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::new(self.code(), Severity::Error, self.to_string());

        match self {
            Self::DuplicateModel { second, .. } => {
                diag = diag.with_location(Location::new(second.display().to_string()));
            }
            Self::ModelPathNotFound(path) | Self::Io { path, .. } => {
                diag = diag.with_location(Location::new(path.display().to_string()));
            }
            Self::CycleDetected { .. } => {
                let members = self.models().into_iter().map(String::from).collect();
                diag = diag.with_impact(members);
            }
            _ => {}
        }

        diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_shows_full_path() {
        let err = ValidationError::CycleDetected {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected: a -> b -> a");
        assert_eq!(err.models(), vec!["a", "b"]);
    }

    #[test]
    fn self_cycle_names_the_model_once() {
        let err = ValidationError::CycleDetected {
            cycle: vec!["a".into(), "a".into()],
        };
        assert_eq!(err.models(), vec!["a"]);
    }

    #[test]
    fn unresolved_reference_names_both_sides() {
        let err = ValidationError::UnresolvedReference {
            model: "orders".into(),
            reference: "customers".into(),
        };
        let message = err.to_string();
        assert!(message.contains("orders"));
        assert!(message.contains("customers"));
        assert_eq!(err.to_diagnostic().code, DiagnosticCode::UnresolvedReference);
    }

    #[test]
    fn duplicate_model_diagnostic_points_at_second_file() {
        let err = ValidationError::DuplicateModel {
            name: "orders".into(),
            first: PathBuf::from("models/a/orders.sql"),
            second: PathBuf::from("models/b/orders.sql"),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.location.unwrap().file, "models/b/orders.sql");
    }

    #[test]
    fn missing_model_dir_has_its_own_code() {
        let err = ValidationError::ModelPathNotFound(PathBuf::from("project/models"));
        let diag = err.to_diagnostic();
        assert_eq!(diag.code, DiagnosticCode::ModelPathNotFound);
        assert_eq!(diag.code.as_str(), "MODEL_PATH_NOT_FOUND");
        assert_eq!(diag.location.unwrap().file, "project/models");

        let io = ValidationError::Io {
            path: PathBuf::from("models/a.sql"),
            message: "permission denied".to_string(),
        };
        assert_eq!(io.code(), DiagnosticCode::ProjectReadError);
    }
}
