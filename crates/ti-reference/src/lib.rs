//! ti-reference: analytic free energies of the reference systems.
//!
//! Provides:
//! - Uhlenbeck–Ford fluid excess free energy: virial series in the dilute
//!   limit, hypernetted-chain solution at liquid densities
//! - Ideal-gas free energy with the ideal mixing term
//! - Einstein crystal free energy with the centre-of-mass correction
//! - `ReferenceModel`, the per-phase choice of which terms make up F_ref
//!
//! Every function is pure and works in metal units: eV per atom, Å, amu, K.

pub mod einstein;
pub mod error;
pub mod hnc;
pub mod ideal_gas;
pub mod model;
pub mod uhlenbeck_ford;

pub use einstein::{einstein_crystal_free_energy, spring_constant_from_msd};
pub use error::{ReferenceError, ReferenceResult};
pub use hnc::{HncConfig, HncSolution, HncSolver};
pub use ideal_gas::{
    ideal_gas_free_energy, ideal_gas_mixing_free_energy, ideal_gas_mixture_free_energy,
    mixing_free_energy, thermal_wavelength,
};
pub use model::{ReferenceBreakdown, ReferenceModel, ReferenceState, ReferenceTerm};
pub use uhlenbeck_ford::{
    MAX_REDUCED_DENSITY, UFM_CUTOFF, UFM_P, UFM_SIGMA, UhlenbeckFord, VirialSeries,
    coupling_strength, reduced_density, uhlenbeck_ford_free_energy,
};
