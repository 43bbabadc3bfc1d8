//! Errors raised while driving the engine or reading its outputs.

use std::path::PathBuf;
use thiserror::Error;
use ti_core::ErrorKind;
use ti_switching::SwitchingError;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine exited unexpectedly ({status})")]
    Exited { status: String },

    #[error("Engine rejected `{command}`: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Unexpected engine output: {what}")]
    Protocol { what: String },

    #[error("Output {} did not appear", path.display())]
    MissingOutput { path: PathBuf },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse {} line {line}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error(transparent)]
    Series(#[from] SwitchingError),

    #[error("Invalid input: {what}")]
    InvalidInput { what: String },

    #[error("Backend used out of order: {what}")]
    State { what: &'static str },

    #[error("Cancelled")]
    Cancelled,
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Series(e) => e.kind(),
            BackendError::InvalidInput { .. } => ErrorKind::InvalidParameter,
            BackendError::State { .. } => ErrorKind::Internal,
            BackendError::Cancelled => ErrorKind::Cancelled,
            BackendError::Spawn { .. }
            | BackendError::Exited { .. }
            | BackendError::CommandFailed { .. }
            | BackendError::Protocol { .. }
            | BackendError::MissingOutput { .. }
            | BackendError::Io { .. }
            | BackendError::Parse { .. } => ErrorKind::BackendExecution,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }
}
