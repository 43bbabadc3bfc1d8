use core::fmt;
use thiserror::Error;

pub type TiResult<T> = Result<T, TiError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TiError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}

impl TiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TiError::NonFinite { .. } | TiError::InvalidArg { .. } => ErrorKind::InvalidParameter,
            TiError::Invariant { .. } => ErrorKind::Internal,
        }
    }
}

/// Failure categories shared by every crate in the workspace.
///
/// Each crate keeps its own error enum; `kind()` on those enums maps onto
/// this list so a failed job can always report what went wrong in terms a
/// user can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    InvalidParameter,
    BackendExecution,
    DidNotMelt,
    InsufficientData,
    MalformedSeries,
    FileNotFound,
    UnsupportedLattice,
    Configuration,
    Io,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "InvalidParameter",
            ErrorKind::BackendExecution => "BackendExecutionError",
            ErrorKind::DidNotMelt => "DidNotMelt",
            ErrorKind::InsufficientData => "InsufficientData",
            ErrorKind::MalformedSeries => "MalformedSeries",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::UnsupportedLattice => "UnsupportedLattice",
            ErrorKind::Configuration => "Configuration",
            ErrorKind::Io => "Io",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_stable_labels() {
        assert_eq!(ErrorKind::BackendExecution.to_string(), "BackendExecutionError");
        assert_eq!(ErrorKind::DidNotMelt.label(), "DidNotMelt");
    }

    #[test]
    fn non_finite_is_invalid_parameter() {
        let err = TiError::NonFinite {
            what: "density",
            value: f64::NAN,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(err.to_string().contains("density"));
    }
}
