//! Error types for the ti-app service layer.

use crate::progress::JobStage;
use core::fmt;
use ti_core::ErrorKind;

/// Application error wrapping the errors of every lower crate.
///
/// Sources keep their type so `kind()` can report the failure category.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(#[from] ti_project::ProjectError),

    #[error("Lattice error: {0}")]
    Lattice(#[from] ti_project::LatticeError),

    #[error("Results error: {0}")]
    Results(#[from] ti_results::ResultsError),

    #[error("Backend error: {0}")]
    Backend(#[from] ti_backend::BackendError),

    #[error("Switching error: {0}")]
    Switching(#[from] ti_switching::SwitchingError),

    #[error("Reference error: {0}")]
    Reference(#[from] ti_reference::ReferenceError),

    #[error("Invalid state: {0}")]
    Core(#[from] ti_core::TiError),

    #[error("System did not melt: solid fraction {fraction:.3} exceeds {threshold}")]
    DidNotMelt { fraction: f64, threshold: f64 },

    #[error("Missing output: {what}")]
    MissingOutput { what: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("{0}")]
    Job(JobFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ti-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Project(e) => e.kind(),
            AppError::Lattice(e) => e.kind(),
            AppError::Results(e) => e.kind(),
            AppError::Backend(e) => e.kind(),
            AppError::Switching(e) => e.kind(),
            AppError::Reference(e) => e.kind(),
            AppError::Core(e) => e.kind(),
            AppError::DidNotMelt { .. } => ErrorKind::DidNotMelt,
            AppError::MissingOutput { .. } => ErrorKind::BackendExecution,
            AppError::InvalidInput(_) => ErrorKind::InvalidParameter,
            AppError::Cancelled => ErrorKind::Cancelled,
            AppError::Job(f) => f.kind,
            AppError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Terminal record of a failed job: where it stopped and why.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub stage: JobStage,
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(stage: JobStage, error: &AppError) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} failed with {}: {}", self.stage, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ti_switching::{Direction, SwitchingError};

    #[test]
    fn kinds_follow_sources() {
        let e: AppError = SwitchingError::MissingFile {
            path: "backward_1.dat".into(),
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::BackendExecution);

        let e: AppError = ti_backend::BackendError::from(SwitchingError::InsufficientData {
            direction: Direction::Forward,
            replicate: 1,
            samples: 1,
        })
        .into();
        assert_eq!(e.kind(), ErrorKind::InsufficientData);

        let e = AppError::DidNotMelt {
            fraction: 0.9,
            threshold: 0.5,
        };
        assert_eq!(e.kind(), ErrorKind::DidNotMelt);
    }

    #[test]
    fn failure_names_stage_and_kind() {
        let f = JobFailure::new(JobStage::MeltCheck, &AppError::DidNotMelt {
            fraction: 0.75,
            threshold: 0.5,
        });
        let text = f.to_string();
        assert!(text.contains("MELT_CHECK"), "{text}");
        assert!(text.contains("DidNotMelt"), "{text}");
    }
}
