//! Einstein crystal: independent harmonic oscillators tethered to lattice sites.

use crate::error::{ReferenceError, ReferenceResult, finite, positive};
use std::f64::consts::PI;
use ti_core::units::constants::{AMU_KG, HBAR_J_S, kbt_ev};
use ti_core::units::{angstrom_to_meter, ev_to_joule, joule_to_ev};

/// `k = 3 k_B T / ⟨Δr²⟩` [eV/Å²] from a mean-squared displacement [Å²].
pub fn spring_constant_from_msd(temperature: f64, msd: f64) -> ReferenceResult<f64> {
    let t = positive(temperature, "temperature")?;
    let msd = positive(msd, "mean squared displacement")?;
    Ok(3.0 * kbt_ev(t) / msd)
}

/// Free energy per atom [eV] of `natoms` oscillators with spring constant
/// `k` [eV/Å²], mass [amu], at density `rho` [Å⁻³].
///
/// Includes the correction for the fixed centre of mass.
pub fn einstein_crystal_free_energy(
    temperature: f64,
    rho: f64,
    natoms: usize,
    mass: f64,
    spring_constant: f64,
) -> ReferenceResult<f64> {
    let t = positive(temperature, "temperature")?;
    let rho = positive(rho, "density")?;
    let mass = positive(mass, "mass")?;
    let k = positive(spring_constant, "spring constant")?;
    if natoms == 0 {
        return Err(ReferenceError::InvalidParameter {
            what: "atom count",
            value: 0.0,
        });
    }
    let kt = kbt_ev(t);

    // ω = sqrt(k/m) in SI
    let k_si = ev_to_joule(k) / angstrom_to_meter(1.0).powi(2);
    let omega = (k_si / (mass * AMU_KG)).sqrt();
    let hbar_omega = joule_to_ev(HBAR_J_S * omega);
    let harmonic = 3.0 * kt * (hbar_omega / kt).ln();

    let n = natoms as f64;
    let com = (kt / n) * (rho * (2.0 * PI * kt / (n * k)).powf(1.5)).ln();

    finite(harmonic + com, "einstein free energy")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spring_constant_from_equipartition() {
        let k = spring_constant_from_msd(300.0, 0.01).unwrap();
        assert!((k - 3.0 * kbt_ev(300.0) / 0.01).abs() < 1e-12);
        assert!(spring_constant_from_msd(300.0, 0.0).is_err());
    }

    #[test]
    fn stiffer_springs_raise_free_energy() {
        let soft = einstein_crystal_free_energy(500.0, 0.085, 500, 63.546, 1.0).unwrap();
        let stiff = einstein_crystal_free_energy(500.0, 0.085, 500, 63.546, 4.0).unwrap();
        // 3kT ln(2) from ω ∝ sqrt(k), minus a small centre-of-mass shift
        assert!(stiff > soft);
        let expected = 1.5 * kbt_ev(500.0) * 4f64.ln();
        assert!((stiff - soft - expected).abs() < 1e-3);
    }

    #[test]
    fn classical_limit_is_negative() {
        // ħω ≪ kT for copper-like springs at 1000 K
        let f = einstein_crystal_free_energy(1000.0, 0.085, 864, 63.546, 3.0).unwrap();
        assert!(f < 0.0);
    }

    #[test]
    fn rejects_empty_system() {
        assert!(einstein_crystal_free_energy(500.0, 0.085, 0, 63.546, 1.0).is_err());
    }
}
