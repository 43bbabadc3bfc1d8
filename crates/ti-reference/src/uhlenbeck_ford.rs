//! Uhlenbeck–Ford fluid reference.
//!
//! Pair potential `u(r) = -(p / β) ln(1 - exp(-(r/σ)²))`, so with
//! `ε = p k_B T` the reduced thermodynamics depend on `p` alone. In the
//! dilute limit the excess free energy per atom follows the virial series
//!
//! ```text
//! β f_ex = Σ_n  B̃_{n+1} xⁿ / n,     x = b₂ ρ,   b₂ = ½ (π σ²)^{3/2}
//! ```
//!
//! `B̃₂` and `B̃₃` are evaluated by quadrature of the Mayer function in
//! reduced units (σ = 1). At p = 50 liquids sit near x ≈ 0.75, where the
//! third term outweighs the second and the truncation is off by a third.
//! The reference value is therefore the hypernetted-chain solution, which
//! reproduces `B̃₂` and `B̃₃` exactly and stays bounded at liquid densities.

use crate::error::{ReferenceError, ReferenceResult, finite, positive};
use crate::hnc::{HncConfig, HncSolver};
use std::f64::consts::PI;
use ti_core::units::constants::{KB_EV_PER_K, kbt_ev};
use tracing::debug;

/// Coupling strength `p = ε / k_B T` used for every liquid reference run.
pub const UFM_P: f64 = 50.0;
/// Length scale σ of the reference potential [Å].
pub const UFM_SIGMA: f64 = 1.5;
/// Pair cutoff passed to the MD engine [Å].
pub const UFM_CUTOFF: f64 = 7.5;

/// Largest reduced density `x = b₂ρ` the reference is evaluated at.
pub const MAX_REDUCED_DENSITY: f64 = 5.0;

/// Last retained series term relative to the first.
const SERIES_TOLERANCE: f64 = 1e-3;

const R_INTERVALS: usize = 1200;
const Q_INTERVALS: usize = 300;

/// `ε = UFM_P k_B T` [eV].
pub fn coupling_strength(temperature: f64) -> f64 {
    UFM_P * kbt_ev(temperature)
}

/// `b₂ = ½ (π σ²)^{3/2}`, the Gaussian second virial volume.
fn b2(sigma: f64) -> f64 {
    0.5 * (PI * sigma * sigma).powf(1.5)
}

/// Dimensionless density `x = b₂ ρ`.
pub fn reduced_density(rho: f64, sigma: f64) -> f64 {
    b2(sigma) * rho
}

/// Mayer function `exp(-βu) - 1 = (1 - e^{-r²})^p - 1` in reduced units.
fn mayer(r: f64, p: f64) -> f64 {
    let s = -(-r * r).exp_m1();
    if s <= 0.0 {
        -1.0
    } else {
        (p * s.ln()).exp_m1()
    }
}

/// `βu(r)` in reduced units.
fn beta_u(r: f64, p: f64) -> f64 {
    -p * (-(-r * r).exp_m1()).ln()
}

/// `dβu/dr` in reduced units.
fn beta_du(r: f64, p: f64) -> f64 {
    -2.0 * p * r / (r * r).exp_m1()
}

fn j0(x: f64) -> f64 {
    if x.abs() < 1e-8 { 1.0 } else { x.sin() / x }
}

/// Reduced virial coefficients `B̃₂, B̃₃, ...` of the UF fluid at a given `p`.
#[derive(Debug, Clone, PartialEq)]
pub struct VirialSeries {
    p: f64,
    coefficients: Vec<f64>,
}

impl VirialSeries {
    /// Second and third coefficients by quadrature.
    pub fn for_p(p: f64) -> ReferenceResult<Self> {
        let p = positive(p, "uf coupling p")?;
        let lp = p.max(1.0).ln();
        // Mayer function decays like exp(-r²) · p; f̂(q) like exp(-q²/4p).
        let r_max = (lp + 40.0).sqrt();
        let q_max = 12.0 + 8.0 * lp;

        let h = r_max / R_INTERVALS as f64;
        let weighted: Vec<(f64, f64)> = (0..=R_INTERVALS)
            .map(|i| {
                let r = h * i as f64;
                let w = if i == 0 || i == R_INTERVALS {
                    1.0
                } else if i % 2 == 1 {
                    4.0
                } else {
                    2.0
                };
                (r, w * r * r * mayer(r, p) * h / 3.0)
            })
            .collect();

        let b2_integral: f64 = weighted.iter().map(|(_, wf)| wf).sum();
        let big_b2 = -2.0 * PI * b2_integral;

        let f_hat = |q: f64| -> f64 {
            4.0 * PI * weighted.iter().map(|&(r, wf)| wf * j0(q * r)).sum::<f64>()
        };
        let b3_integral = ti_core::simpson(|q| q * q * f_hat(q).powi(3), 0.0, q_max, Q_INTERVALS);
        let big_b3 = -(1.0 / 3.0) * (2.0 * PI).powi(-3) * 4.0 * PI * b3_integral;

        let scale = b2(1.0);
        let coefficients = vec![
            finite(big_b2 / scale, "uf second virial coefficient")?,
            finite(big_b3 / (scale * scale), "uf third virial coefficient")?,
        ];
        Ok(Self { p, coefficients })
    }

    /// Append `B̃₄, B̃₅, ...` from an external table.
    pub fn with_higher_orders(mut self, extra: &[f64]) -> Self {
        self.coefficients.extend_from_slice(extra);
        self
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    /// `[B̃₂, B̃₃, ...]`
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Largest `x` at which the last retained term is within
    /// `SERIES_TOLERANCE` of the first.
    pub fn convergence_limit(&self) -> f64 {
        let (Some(first), Some(last)) = (self.coefficients.first(), self.coefficients.last()) else {
            return 0.0;
        };
        let n = self.coefficients.len();
        if n < 2 || *last == 0.0 {
            return 0.0;
        }
        (SERIES_TOLERANCE * n as f64 * first.abs() / last.abs()).powf(1.0 / (n - 1) as f64)
    }

    /// `β f_ex` at reduced density `x`, inside the convergence limit only.
    pub fn excess_beta_f(&self, x: f64) -> ReferenceResult<f64> {
        if !(x.is_finite() && x >= 0.0 && x <= self.convergence_limit()) {
            return Err(ReferenceError::InvalidParameter {
                what: "virial series reduced density",
                value: x,
            });
        }
        Ok(self
            .coefficients
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let n = (i + 1) as i32;
                b * x.powi(n) / n as f64
            })
            .sum())
    }
}

/// The reference fluid: fixed `p` and σ, with its series computed once.
#[derive(Debug, Clone, PartialEq)]
pub struct UhlenbeckFord {
    sigma: f64,
    series: VirialSeries,
}

impl UhlenbeckFord {
    pub fn new(p: f64, sigma: f64) -> ReferenceResult<Self> {
        let sigma = positive(sigma, "uf sigma")?;
        Ok(Self {
            sigma,
            series: VirialSeries::for_p(p)?,
        })
    }

    /// The calibrated reference used by liquid jobs.
    pub fn calibrated() -> ReferenceResult<Self> {
        Self::new(UFM_P, UFM_SIGMA)
    }

    pub fn p(&self) -> f64 {
        self.series.p()
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn series(&self) -> &VirialSeries {
        &self.series
    }

    /// ε [eV] that realises this `p` at temperature `t`.
    pub fn epsilon(&self, temperature: f64) -> f64 {
        self.p() * kbt_ev(temperature)
    }

    /// `β f_ex` at reduced density `x` from the HNC solution.
    pub fn excess_beta_f(&self, x: f64) -> ReferenceResult<f64> {
        if !(x.is_finite() && x > 0.0 && x <= MAX_REDUCED_DENSITY) {
            return Err(ReferenceError::InvalidParameter {
                what: "uf reduced density",
                value: x,
            });
        }
        let p = self.p();
        let solver = HncSolver::new(HncConfig::default())?;
        let solution = solver.solve(|r| beta_u(r, p), x / b2(1.0))?;
        let f = solution.excess_free_energy(|r| beta_du(r, p))?;
        debug!(p, x, beta_f = f, iterations = solution.iterations(), "uf excess free energy");
        Ok(f)
    }

    /// Excess free energy per atom [eV] at temperature [K] and number density [Å⁻³].
    pub fn excess_free_energy(&self, temperature: f64, rho: f64) -> ReferenceResult<f64> {
        let t = positive(temperature, "temperature")?;
        let rho = positive(rho, "density")?;
        let x = reduced_density(rho, self.sigma);
        finite(kbt_ev(t) * self.excess_beta_f(x)?, "uf free energy")
    }
}

/// Excess free energy per atom [eV] of the UF fluid with energy scale `epsilon` [eV]
/// and length scale `sigma` [Å] at temperature [K] and density [Å⁻³].
pub fn uhlenbeck_ford_free_energy(
    temperature: f64,
    rho: f64,
    epsilon: f64,
    sigma: f64,
) -> ReferenceResult<f64> {
    let t = positive(temperature, "temperature")?;
    positive(rho, "density")?;
    let epsilon = positive(epsilon, "uf epsilon")?;
    let p = epsilon / (KB_EV_PER_K * t);
    if !p.is_finite() {
        return Err(ReferenceError::InvalidParameter {
            what: "uf coupling p",
            value: p,
        });
    }
    UhlenbeckFord::new(p, sigma)?.excess_free_energy(t, rho)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * b.abs().max(1.0)
    }

    #[test]
    fn p_one_matches_closed_form() {
        // (1 - e^{-r²}) - 1 = -e^{-r²}: B̃₂ = 1, B̃₃ = 4 / 3^{5/2}
        let s = VirialSeries::for_p(1.0).unwrap();
        let c = s.coefficients();
        assert!(close(c[0], 1.0, 1e-7), "B2 = {}", c[0]);
        assert!(close(c[1], 4.0 / 3f64.powf(2.5), 1e-7), "B3 = {}", c[1]);
    }

    #[test]
    fn integer_p_matches_gaussian_sums() {
        let two = VirialSeries::for_p(2.0).unwrap();
        assert!(close(two.coefficients()[0], 1.646_446_609_4, 1e-7));
        assert!(close(two.coefficients()[1], 0.943_195_827_2, 1e-6));

        let three = VirialSeries::for_p(3.0).unwrap();
        assert!(close(three.coefficients()[0], 2.131_789_918_0, 1e-7));
        assert!(close(three.coefficients()[1], 1.799_490_308_2, 1e-6));
    }

    #[test]
    fn calibrated_coefficients() {
        let uf = UhlenbeckFord::calibrated().unwrap();
        let c = uf.series().coefficients();
        assert!(close(c[0], 7.387_621, 1e-5), "B2 = {}", c[0]);
        assert!(close(c[1], 30.699_875, 1e-4), "B3 = {}", c[1]);
    }

    #[test]
    fn epsilon_reproduces_p() {
        let eps = coupling_strength(500.0);
        assert!(close(eps, 50.0 * 500.0 * KB_EV_PER_K, 1e-12));
        let uf = UhlenbeckFord::calibrated().unwrap();
        assert!(close(uf.epsilon(500.0), eps, 1e-12));
    }

    /// ζ(5/2); `β f_ex ≤ x p ζ(5/2)` is the mean-field bound `ρ/2 ∫ βu d³r`.
    const ZETA_5_2: f64 = 1.341_487_257_250_917;

    #[test]
    fn liquid_density_values_at_p50() {
        let uf = UhlenbeckFord::calibrated().unwrap();
        let f = uf.excess_beta_f(0.75).unwrap();
        assert!(close(f, 20.744_294, 1e-5), "f(0.75) = {f}");
        let f = uf.excess_beta_f(1.0).unwrap();
        assert!(close(f, 32.737_821, 1e-5), "f(1.0) = {f}");

        // the truncated series falls well short here
        let c = uf.series().coefficients();
        let truncated = c[0] * 0.75 + c[1] * 0.75 * 0.75 / 2.0;
        assert!(uf.excess_beta_f(0.75).unwrap() > truncated + 5.0);
    }

    #[test]
    fn weak_coupling_value() {
        let uf = UhlenbeckFord::new(1.0, 1.0).unwrap();
        let f = uf.excess_beta_f(0.75).unwrap();
        assert!(close(f, 0.806_990, 1e-5), "f = {f}");
    }

    #[test]
    fn dilute_limit_matches_virial_series() {
        let uf = UhlenbeckFord::calibrated().unwrap();
        let x = 4e-4;
        let series = uf.series().excess_beta_f(x).unwrap();
        let hnc = uf.excess_beta_f(x).unwrap();
        assert!((hnc - series).abs() < 1e-4 * series, "{hnc} vs {series}");
    }

    #[test]
    fn series_refuses_densities_past_convergence() {
        let s = VirialSeries::for_p(UFM_P).unwrap();
        let limit = s.convergence_limit();
        assert!(limit > 1e-4 && limit < 1e-3, "limit = {limit}");
        assert!(s.excess_beta_f(0.5 * limit).is_ok());
        assert!(matches!(
            s.excess_beta_f(0.75),
            Err(ReferenceError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn free_energy_is_positive_for_repulsive_fluid() {
        let f = uhlenbeck_ford_free_energy(500.0, 0.08, coupling_strength(500.0), UFM_SIGMA).unwrap();
        assert!(f > 0.0);
        let x = reduced_density(0.08, UFM_SIGMA);
        assert!(f / kbt_ev(500.0) <= x * UFM_P * ZETA_5_2);
        // β f_ex is independent of T at fixed p
        let g = uhlenbeck_ford_free_energy(1000.0, 0.08, coupling_strength(1000.0), UFM_SIGMA).unwrap();
        assert!(close(g / kbt_ev(1000.0), f / kbt_ev(500.0), 1e-9));
    }

    #[test]
    fn rejects_densities_beyond_covered_range() {
        let rho = 1.1 * MAX_REDUCED_DENSITY / reduced_density(1.0, UFM_SIGMA);
        let err = uhlenbeck_ford_free_energy(500.0, rho, coupling_strength(500.0), UFM_SIGMA).unwrap_err();
        assert!(matches!(
            err,
            ReferenceError::InvalidParameter {
                what: "uf reduced density",
                ..
            }
        ));
    }

    #[test]
    fn higher_orders_extend_the_series() {
        let base = VirialSeries::for_p(1.0).unwrap();
        let x = 0.005;
        let extended = base.clone().with_higher_orders(&[0.5]);
        let extra = extended.excess_beta_f(x).unwrap() - base.excess_beta_f(x).unwrap();
        assert!(close(extra, 0.5 * x.powi(3) / 3.0, 1e-12));
    }

    #[test]
    fn rejects_non_positive_inputs() {
        assert!(matches!(
            uhlenbeck_ford_free_energy(0.0, 0.05, 1.0, 1.5),
            Err(ReferenceError::InvalidParameter { .. })
        ));
        assert!(uhlenbeck_ford_free_energy(300.0, -0.05, 1.0, 1.5).is_err());
        assert!(uhlenbeck_ford_free_energy(300.0, 0.05, 0.0, 1.5).is_err());
        assert!(uhlenbeck_ford_free_energy(300.0, 0.05, 1.0, f64::NAN).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(12))]

            #[test]
            fn bounded_inside_covered_range(
                t in 10.0f64..3000.0,
                rho in 1e-4f64..0.2,
                p in 0.5f64..100.0,
                sigma in 0.5f64..3.0,
            ) {
                let eps = p * kbt_ev(t);
                let x = reduced_density(rho, sigma);
                match uhlenbeck_ford_free_energy(t, rho, eps, sigma) {
                    Ok(f) => {
                        prop_assert!(x <= MAX_REDUCED_DENSITY);
                        let beta_f = f / kbt_ev(t);
                        prop_assert!(beta_f > 0.0);
                        prop_assert!(beta_f <= x * p * ZETA_5_2 * (1.0 + 1e-6));
                    }
                    Err(err) => {
                        prop_assert!(x > MAX_REDUCED_DENSITY, "x = {x}: {err}");
                    }
                }
            }

            #[test]
            fn continuous_in_density_and_epsilon(
                t in 100.0f64..2000.0,
                rho in 1e-3f64..0.12,
                p in 1.0f64..100.0,
            ) {
                let eps = p * kbt_ev(t);
                let f = uhlenbeck_ford_free_energy(t, rho, eps, UFM_SIGMA).unwrap();
                let f_rho = uhlenbeck_ford_free_energy(t, rho * (1.0 + 1e-7), eps, UFM_SIGMA).unwrap();
                let f_eps = uhlenbeck_ford_free_energy(t, rho, eps * (1.0 + 1e-7), UFM_SIGMA).unwrap();
                let scale = f.abs().max(1e-6);
                prop_assert!((f_rho - f).abs() <= 1e-5 * scale);
                prop_assert!((f_eps - f).abs() <= 1e-5 * scale);
            }
        }
    }
}
