//! Reference free-energy errors.

use thiserror::Error;
use ti_core::{ErrorKind, TiError};

/// Result type for reference free-energy evaluations.
pub type ReferenceResult<T> = Result<T, ReferenceError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    /// Input outside the physical domain (non-positive density, bad fractions, ...).
    #[error("Invalid parameter {what}: {value}")]
    InvalidParameter { what: &'static str, value: f64 },

    /// Evaluation produced a non-finite number.
    #[error("Non-finite reference free energy for {what}")]
    NonFinite { what: &'static str },
}

impl ReferenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReferenceError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            ReferenceError::NonFinite { .. } => ErrorKind::Internal,
        }
    }
}

impl From<TiError> for ReferenceError {
    fn from(err: TiError) -> Self {
        match err {
            TiError::NonFinite { what, value } => ReferenceError::InvalidParameter { what, value },
            TiError::InvalidArg { what } => ReferenceError::InvalidParameter {
                what,
                value: f64::NAN,
            },
            TiError::Invariant { what } => ReferenceError::NonFinite { what },
        }
    }
}

/// Positive and finite, or `InvalidParameter` carrying the offending value.
pub(crate) fn positive(v: f64, what: &'static str) -> ReferenceResult<f64> {
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(ReferenceError::InvalidParameter { what, value: v })
    }
}

pub(crate) fn finite(v: f64, what: &'static str) -> ReferenceResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ReferenceError::NonFinite { what })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ReferenceError::InvalidParameter {
            what: "density",
            value: -1.0,
        };
        assert!(err.to_string().contains("density"));
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn positive_rejects_nan() {
        assert!(positive(f64::NAN, "t").is_err());
        assert!(positive(0.0, "t").is_err());
        assert_eq!(positive(1.0, "t"), Ok(1.0));
    }
}
