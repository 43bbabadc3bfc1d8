//! ti-results: free-energy reports and job storage.

pub mod hash;
pub mod store;
pub mod types;

pub use hash::compute_job_id;
pub use store::ReportStore;
pub use types::*;

use ti_core::ErrorKind;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("Report already written for job {job_id}")]
    AlreadyReported { job_id: String },

    #[error("Invalid report: {what}")]
    InvalidReport { what: &'static str },
}

impl ResultsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResultsError::Io(_) => ErrorKind::Io,
            ResultsError::Json(_) | ResultsError::Yaml(_) => ErrorKind::Configuration,
            ResultsError::JobNotFound { .. } => ErrorKind::FileNotFound,
            ResultsError::AlreadyReported { .. } => ErrorKind::Internal,
            ResultsError::InvalidReport { .. } => ErrorKind::InvalidParameter,
        }
    }
}
