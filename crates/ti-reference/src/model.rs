//! Reference model selection: which analytic terms make up F_ref for a phase.

use crate::einstein::einstein_crystal_free_energy;
use crate::error::{ReferenceError, ReferenceResult};
use crate::ideal_gas::{ideal_gas_free_energy, mixing_free_energy};
use crate::uhlenbeck_ford::{UFM_P, UFM_SIGMA, UhlenbeckFord};
use ti_core::Phase;

/// Per-phase reference choice.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceModel {
    /// Ideal gas (with mixing) plus the UF excess term.
    UhlenbeckFord { p: f64, sigma: f64 },
    /// Tethered harmonic oscillators; needs a spring constant.
    EinsteinCrystal,
}

impl ReferenceModel {
    pub fn default_for(phase: Phase) -> Self {
        match phase {
            Phase::Liquid => ReferenceModel::UhlenbeckFord {
                p: UFM_P,
                sigma: UFM_SIGMA,
            },
            Phase::Solid => ReferenceModel::EinsteinCrystal,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReferenceModel::UhlenbeckFord { .. } => "uhlenbeck-ford",
            ReferenceModel::EinsteinCrystal => "einstein",
        }
    }

    pub fn free_energy(&self, state: &ReferenceState) -> ReferenceResult<ReferenceBreakdown> {
        let t = state.temperature;
        let mut terms = Vec::with_capacity(3);
        match self {
            ReferenceModel::UhlenbeckFord { p, sigma } => {
                terms.push((
                    ReferenceTerm::IdealGas,
                    ideal_gas_free_energy(t, state.density, state.natoms, state.mass)?,
                ));
                terms.push((
                    ReferenceTerm::Mixing,
                    mixing_free_energy(t, &state.concentration)?,
                ));
                let uf = UhlenbeckFord::new(*p, *sigma)?;
                terms.push((
                    ReferenceTerm::UhlenbeckFord,
                    uf.excess_free_energy(t, state.density)?,
                ));
            }
            ReferenceModel::EinsteinCrystal => {
                let k = state
                    .spring_constant
                    .ok_or(ReferenceError::InvalidParameter {
                        what: "spring constant",
                        value: f64::NAN,
                    })?;
                terms.push((
                    ReferenceTerm::Einstein,
                    einstein_crystal_free_energy(t, state.density, state.natoms, state.mass, k)?,
                ));
                terms.push((
                    ReferenceTerm::Mixing,
                    mixing_free_energy(t, &state.concentration)?,
                ));
            }
        }
        Ok(ReferenceBreakdown { terms })
    }
}

/// Everything the reference terms need, measured during equilibration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceState {
    pub temperature: f64,
    /// Number density [Å⁻³]
    pub density: f64,
    pub natoms: usize,
    /// [amu]
    pub mass: f64,
    pub concentration: Vec<f64>,
    /// [eV/Å²], solids only
    pub spring_constant: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTerm {
    IdealGas,
    Mixing,
    UhlenbeckFord,
    Einstein,
}

impl ReferenceTerm {
    pub fn label(self) -> &'static str {
        match self {
            ReferenceTerm::IdealGas => "ideal_gas",
            ReferenceTerm::Mixing => "mixing",
            ReferenceTerm::UhlenbeckFord => "uhlenbeck_ford",
            ReferenceTerm::Einstein => "einstein",
        }
    }
}

/// Individual contributions to F_ref [eV/atom].
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceBreakdown {
    terms: Vec<(ReferenceTerm, f64)>,
}

impl ReferenceBreakdown {
    pub fn terms(&self) -> &[(ReferenceTerm, f64)] {
        &self.terms
    }

    pub fn get(&self, term: ReferenceTerm) -> Option<f64> {
        self.terms.iter().find(|(t, _)| *t == term).map(|(_, v)| *v)
    }

    pub fn total(&self) -> f64 {
        self.terms.iter().map(|(_, v)| v).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ideal_gas::ideal_gas_mixing_free_energy;
    use crate::uhlenbeck_ford::{coupling_strength, uhlenbeck_ford_free_energy};

    fn liquid_state() -> ReferenceState {
        ReferenceState {
            temperature: 1400.0,
            density: 0.076,
            natoms: 500,
            mass: 63.546,
            concentration: vec![1.0],
            spring_constant: None,
        }
    }

    #[test]
    fn liquid_reference_is_ideal_plus_uf() {
        let state = liquid_state();
        let b = ReferenceModel::default_for(Phase::Liquid)
            .free_energy(&state)
            .unwrap();
        let ideal = ideal_gas_mixing_free_energy(1400.0, 0.076, 500, 63.546, 1.0, 0.0).unwrap();
        let uf =
            uhlenbeck_ford_free_energy(1400.0, 0.076, coupling_strength(1400.0), UFM_SIGMA).unwrap();
        assert!((b.total() - (ideal + uf)).abs() < 1e-10);
        assert_eq!(b.get(ReferenceTerm::Mixing), Some(0.0));
    }

    #[test]
    fn solid_reference_needs_spring_constant() {
        let state = liquid_state();
        let err = ReferenceModel::EinsteinCrystal.free_energy(&state).unwrap_err();
        assert!(matches!(err, ReferenceError::InvalidParameter { .. }));

        let state = ReferenceState {
            spring_constant: Some(2.0),
            ..liquid_state()
        };
        let b = ReferenceModel::default_for(Phase::Solid)
            .free_energy(&state)
            .unwrap();
        assert!(b.get(ReferenceTerm::Einstein).is_some());
        assert!(b.get(ReferenceTerm::UhlenbeckFord).is_none());
    }

    #[test]
    fn bad_concentration_propagates() {
        let state = ReferenceState {
            concentration: vec![0.6, 0.6],
            ..liquid_state()
        };
        assert!(
            ReferenceModel::default_for(Phase::Liquid)
                .free_energy(&state)
                .is_err()
        );
    }
}
