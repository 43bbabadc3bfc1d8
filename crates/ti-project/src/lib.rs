//! ti-project: job file format, validation and lattice lookup.

pub mod lattice;
pub mod schema;
pub mod validate;

pub use lattice::{
    ElementData, LatticeError, PreparedLattice, conversion_factor, element, elements, prepare_lattice,
    read_data_composition,
};
pub use schema::*;
pub use validate::{LATEST_VERSION, ValidationError, validate_job_file};

use ti_core::ErrorKind;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Lattice error: {0}")]
    Lattice(#[from] LatticeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProjectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProjectError::Validation(e) => e.kind(),
            ProjectError::Lattice(e) => e.kind(),
            ProjectError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::FileNotFound
            }
            ProjectError::Io(_) => ErrorKind::Io,
            ProjectError::Yaml(_) | ProjectError::Json(_) => ErrorKind::Configuration,
        }
    }
}

pub fn load_yaml(path: &std::path::Path) -> ProjectResult<JobFile> {
    let content = std::fs::read_to_string(path)?;
    let job: JobFile = serde_yaml::from_str(&content)?;
    validate_job_file(&job)?;
    Ok(job)
}

pub fn save_yaml(path: &std::path::Path, job: &JobFile) -> ProjectResult<()> {
    validate_job_file(job)?;
    let content = serde_yaml::to_string(job)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> ProjectResult<JobFile> {
    let content = std::fs::read_to_string(path)?;
    let job: JobFile = serde_json::from_str(&content)?;
    validate_job_file(&job)?;
    Ok(job)
}

pub fn save_json(path: &std::path::Path, job: &JobFile) -> ProjectResult<()> {
    validate_job_file(job)?;
    let content = serde_json::to_string_pretty(job)?;
    std::fs::write(path, content)?;
    Ok(())
}
