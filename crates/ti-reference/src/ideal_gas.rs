//! Ideal-gas free energy with ideal mixing.

use crate::error::{ReferenceError, ReferenceResult, finite, positive};
use std::f64::consts::PI;
use ti_core::units::constants::{AMU_KG, KB_J_PER_K, PLANCK_J_S, kbt_ev};
use ti_core::units::meter_to_angstrom;

const FRACTION_SUM_TOLERANCE: f64 = 1e-6;

/// de Broglie thermal wavelength `Λ = h / sqrt(2π m k_B T)` [Å] for a mass in amu.
pub fn thermal_wavelength(temperature: f64, mass: f64) -> ReferenceResult<f64> {
    let t = positive(temperature, "temperature")?;
    let m = positive(mass, "mass")? * AMU_KG;
    let lambda_m = PLANCK_J_S / (2.0 * PI * m * KB_J_PER_K * t).sqrt();
    Ok(meter_to_angstrom(lambda_m))
}

/// Free energy per atom [eV] of `natoms` ideal-gas particles at density `rho` [Å⁻³],
/// including the Stirling correction `ln(2πN) / 2N`.
pub fn ideal_gas_free_energy(
    temperature: f64,
    rho: f64,
    natoms: usize,
    mass: f64,
) -> ReferenceResult<f64> {
    let rho = positive(rho, "density")?;
    if natoms == 0 {
        return Err(ReferenceError::InvalidParameter {
            what: "atom count",
            value: 0.0,
        });
    }
    let lambda = thermal_wavelength(temperature, mass)?;
    let n = natoms as f64;
    let beta_f = (rho * lambda.powi(3)).ln() - 1.0 + (2.0 * PI * n).ln() / (2.0 * n);
    finite(kbt_ev(temperature) * beta_f, "ideal gas free energy")
}

/// `k_B T Σ x ln x` with `0 ln 0 = 0`. Fractions must be non-negative and sum to 1.
pub fn mixing_free_energy(temperature: f64, fractions: &[f64]) -> ReferenceResult<f64> {
    let t = positive(temperature, "temperature")?;
    let mut sum = 0.0;
    let mut entropy = 0.0;
    for &x in fractions {
        if !(x.is_finite() && x >= 0.0) {
            return Err(ReferenceError::InvalidParameter {
                what: "mole fraction",
                value: x,
            });
        }
        sum += x;
        if x > 0.0 {
            entropy += x * x.ln();
        }
    }
    if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
        return Err(ReferenceError::InvalidParameter {
            what: "mole fraction sum",
            value: sum,
        });
    }
    Ok(kbt_ev(t) * entropy)
}

/// Ideal-gas free energy of an arbitrary mixture.
///
/// `mass` is the single mass the simulation uses; for unequal masses pass
/// their geometric mean weighted by the fractions.
pub fn ideal_gas_mixture_free_energy(
    temperature: f64,
    rho: f64,
    natoms: usize,
    mass: f64,
    fractions: &[f64],
) -> ReferenceResult<f64> {
    let mixing = mixing_free_energy(temperature, fractions)?;
    Ok(ideal_gas_free_energy(temperature, rho, natoms, mass)? + mixing)
}

/// Binary form of [`ideal_gas_mixture_free_energy`].
pub fn ideal_gas_mixing_free_energy(
    temperature: f64,
    rho: f64,
    natoms: usize,
    mass: f64,
    x_a: f64,
    x_b: f64,
) -> ReferenceResult<f64> {
    ideal_gas_mixture_free_energy(temperature, rho, natoms, mass, &[x_a, x_b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon_wavelength() {
        // Ar at 300 K: Λ ≈ 0.16 Å
        let l = thermal_wavelength(300.0, 39.948).unwrap();
        assert!((l - 0.159_47).abs() < 1e-4, "Λ = {l}");
    }

    #[test]
    fn pure_limit_equals_ideal_gas() {
        let pure = ideal_gas_free_energy(500.0, 0.08, 500, 63.546).unwrap();
        let mixed = ideal_gas_mixing_free_energy(500.0, 0.08, 500, 63.546, 1.0, 0.0).unwrap();
        assert_eq!(pure, mixed);
    }

    #[test]
    fn equimolar_mixing_term() {
        let m = mixing_free_energy(1000.0, &[0.5, 0.5]).unwrap();
        assert!((m + kbt_ev(1000.0) * 2f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn fractions_over_one_are_rejected() {
        let err = ideal_gas_mixing_free_energy(300.0, 0.05, 100, 1.0, 0.6, 0.6).unwrap_err();
        assert!(matches!(err, ReferenceError::InvalidParameter { .. }));
        assert_eq!(err.kind(), ti_core::ErrorKind::InvalidParameter);
    }

    #[test]
    fn negative_fraction_is_rejected() {
        assert!(ideal_gas_mixing_free_energy(300.0, 0.05, 100, 1.0, 1.2, -0.2).is_err());
    }

    #[test]
    fn empty_system_is_rejected() {
        assert!(ideal_gas_free_energy(300.0, 0.05, 0, 1.0).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mixing_is_symmetric(
                t in 10.0f64..3000.0,
                rho in 1e-3f64..0.2,
                n in 1usize..5000,
                mass in 1.0f64..250.0,
                x in 0.0f64..=1.0,
            ) {
                let ab = ideal_gas_mixing_free_energy(t, rho, n, mass, x, 1.0 - x).unwrap();
                let ba = ideal_gas_mixing_free_energy(t, rho, n, mass, 1.0 - x, x).unwrap();
                prop_assert!((ab - ba).abs() <= 1e-12 * ab.abs().max(1.0));
            }

            #[test]
            fn mixing_lowers_free_energy(x in 0.01f64..0.99) {
                let pure = ideal_gas_free_energy(800.0, 0.06, 256, 26.98).unwrap();
                let mixed = ideal_gas_mixing_free_energy(800.0, 0.06, 256, 26.98, x, 1.0 - x).unwrap();
                prop_assert!(mixed < pure);
            }
        }
    }
}
