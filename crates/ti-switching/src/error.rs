//! Error types for series handling and work integration.

use crate::series::Direction;
use std::path::PathBuf;
use thiserror::Error;
use ti_core::ErrorKind;

#[derive(Error, Debug)]
pub enum SwitchingError {
    #[error("Series file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Series file {} is truncated: {reason}", path.display())]
    Truncated { path: PathBuf, reason: &'static str },

    #[error("Cannot parse {} line {line}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{direction} series of replicate {replicate} has {samples} sample(s), need at least 2")]
    InsufficientData {
        direction: Direction,
        replicate: usize,
        samples: usize,
    },

    #[error("No replicates to integrate")]
    NoReplicates,

    #[error("{direction} series of replicate {replicate} is malformed: {reason}")]
    MalformedSeries {
        direction: Direction,
        replicate: usize,
        reason: String,
    },

    #[error("Replicates do not pair up: {reason}")]
    ReplicateMismatch { reason: String },

    #[error("Invalid protocol: {what}")]
    InvalidProtocol { what: &'static str },
}

pub type SwitchingResult<T> = Result<T, SwitchingError>;

impl SwitchingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwitchingError::MissingFile { .. }
            | SwitchingError::Truncated { .. }
            | SwitchingError::Parse { .. }
            | SwitchingError::Io { .. } => ErrorKind::BackendExecution,
            SwitchingError::InsufficientData { .. } | SwitchingError::NoReplicates => {
                ErrorKind::InsufficientData
            }
            SwitchingError::MalformedSeries { .. } | SwitchingError::ReplicateMismatch { .. } => {
                ErrorKind::MalformedSeries
            }
            SwitchingError::InvalidProtocol { .. } => ErrorKind::InvalidParameter,
        }
    }
}
