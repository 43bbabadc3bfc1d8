//! The thermodynamic target of a job.

use crate::error::{TiError, TiResult};
use crate::numeric::{Tolerances, ensure_finite, ensure_positive, nearly_equal};
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Phase {
    Solid,
    Liquid,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Solid => "solid",
            Phase::Liquid => "liquid",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Temperature [K], pressure [bar], mole fractions, and the melt temperature
/// for liquids. Built once when a job is planned; read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThermodynamicState {
    temperature: f64,
    pressure: f64,
    concentration: Vec<f64>,
    temperature_high: Option<f64>,
}

impl ThermodynamicState {
    pub fn new(temperature: f64, pressure: f64, concentration: Vec<f64>) -> TiResult<Self> {
        ensure_positive(temperature, "temperature")?;
        ensure_finite(pressure, "pressure")?;
        if concentration.is_empty() {
            return Err(TiError::InvalidArg {
                what: "concentration must list at least one species",
            });
        }
        for &x in &concentration {
            ensure_finite(x, "mole fraction")?;
            if x < 0.0 {
                return Err(TiError::InvalidArg {
                    what: "mole fractions must be non-negative",
                });
            }
        }
        let sum: f64 = concentration.iter().sum();
        let tol = Tolerances {
            abs: 1e-6,
            rel: 0.0,
        };
        if !nearly_equal(sum, 1.0, tol) {
            return Err(TiError::InvalidArg {
                what: "mole fractions must sum to 1",
            });
        }
        Ok(Self {
            temperature,
            pressure,
            concentration,
            temperature_high: None,
        })
    }

    /// Attach the melt temperature used by liquid jobs; must exceed the target.
    pub fn with_melt_temperature(mut self, temperature_high: f64) -> TiResult<Self> {
        ensure_positive(temperature_high, "melt temperature")?;
        if temperature_high <= self.temperature {
            return Err(TiError::InvalidArg {
                what: "melt temperature must exceed the target temperature",
            });
        }
        self.temperature_high = Some(temperature_high);
        Ok(self)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn concentration(&self) -> &[f64] {
        &self.concentration
    }

    pub fn temperature_high(&self) -> Option<f64> {
        self.temperature_high
    }

    /// Fraction of the second species (0 for a pure element).
    pub fn solute_fraction(&self) -> f64 {
        self.concentration.get(1).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_state() {
        let s = ThermodynamicState::new(500.0, 0.0, vec![1.0]).unwrap();
        assert_eq!(s.solute_fraction(), 0.0);
        assert!(s.temperature_high().is_none());
    }

    #[test]
    fn fractions_must_sum_to_one() {
        assert!(ThermodynamicState::new(500.0, 0.0, vec![0.6, 0.6]).is_err());
        assert!(ThermodynamicState::new(500.0, 0.0, vec![0.25, 0.75]).is_ok());
    }

    #[test]
    fn melt_temperature_above_target() {
        let s = ThermodynamicState::new(500.0, 0.0, vec![1.0]).unwrap();
        assert!(s.clone().with_melt_temperature(400.0).is_err());
        let s = s.with_melt_temperature(1500.0).unwrap();
        assert_eq!(s.temperature_high(), Some(1500.0));
    }

    #[test]
    fn rejects_non_positive_temperature() {
        assert!(ThermodynamicState::new(0.0, 0.0, vec![1.0]).is_err());
    }
}
