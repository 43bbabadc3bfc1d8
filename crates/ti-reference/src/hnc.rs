//! Hypernetted-chain closure of the Ornstein–Zernike equation.
//!
//! The unknown is the indirect correlation `γ = h - c` on a radial grid. The
//! closure gives `c = exp(-βu + γ) - 1 - γ`; in Fourier space the OZ relation
//! gives back `γ̂ = ρ ĉ² / (1 - ρ ĉ)`. Radial transforms are discrete sine
//! transforms held as one dense matrix.
//!
//! Iterates are mixed and Ng-extrapolated from the last three. Density is
//! raised from zero in steps; a step that leaves the physical domain is
//! retried at half the size.
//!
//! The excess free energy per particle uses the closed HNC chemical potential
//! and the virial pressure, `β f_ex = β μ_ex - (βP/ρ - 1)`.

use crate::error::{ReferenceError, ReferenceResult, finite, positive};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use std::collections::VecDeque;
use std::f64::consts::PI;
use tracing::{debug, trace};

/// Grid and iteration settings.
#[derive(Debug, Clone)]
pub struct HncConfig {
    /// Grid intervals; the solution lives on the interior points.
    pub points: usize,
    /// Radial spacing in units of the potential's length scale
    pub spacing: f64,
    /// Max-norm change of γ between iterations
    pub tolerance: f64,
    /// Per continuation step
    pub max_iterations: usize,
    /// Weight of the new iterate in a plain mixing step
    pub mixing: f64,
    /// Largest density increment per continuation step
    pub density_step: f64,
    pub min_density_step: f64,
}

impl Default for HncConfig {
    fn default() -> Self {
        Self {
            points: 256,
            spacing: 0.04,
            tolerance: 1e-10,
            max_iterations: 1000,
            mixing: 0.5,
            density_step: 0.09,
            min_density_step: 1e-5,
        }
    }
}

/// Iterate left the region where the closure is defined.
struct Diverged;

pub struct HncSolver {
    config: HncConfig,
    r: DVector<f64>,
    /// `4π Δr / k_j`
    forward_scale: DVector<f64>,
    /// `Δk / (2π² r_i)`
    inverse_scale: DVector<f64>,
    k: DVector<f64>,
    sine: DMatrix<f64>,
}

impl HncSolver {
    pub fn new(config: HncConfig) -> ReferenceResult<Self> {
        let dr = positive(config.spacing, "hnc grid spacing")?;
        if config.points < 16 {
            return Err(ReferenceError::InvalidParameter {
                what: "hnc grid points",
                value: config.points as f64,
            });
        }
        let n = config.points;
        let m = n - 1;
        let dk = PI / (n as f64 * dr);
        let r = DVector::from_fn(m, |i, _| (i + 1) as f64 * dr);
        let k = DVector::from_fn(m, |j, _| (j + 1) as f64 * dk);
        let sine = DMatrix::from_fn(m, m, |j, i| (PI * ((i + 1) * (j + 1)) as f64 / n as f64).sin());
        let forward_scale = k.map(|kj| 4.0 * PI * dr / kj);
        let inverse_scale = r.map(|ri| dk / (2.0 * PI * PI * ri));
        Ok(Self {
            config,
            r,
            forward_scale,
            inverse_scale,
            k,
            sine,
        })
    }

    pub fn radii(&self) -> &DVector<f64> {
        &self.r
    }

    fn forward(&self, f: &DVector<f64>) -> DVector<f64> {
        (&self.sine * f.component_mul(&self.r)).component_mul(&self.forward_scale)
    }

    fn inverse(&self, f: &DVector<f64>) -> DVector<f64> {
        (&self.sine * f.component_mul(&self.k)).component_mul(&self.inverse_scale)
    }

    fn direct_correlation(beta_u: &DVector<f64>, gamma: &DVector<f64>) -> Result<DVector<f64>, Diverged> {
        let mut c = DVector::zeros(gamma.len());
        for i in 0..gamma.len() {
            let e = gamma[i] - beta_u[i];
            if e > 700.0 {
                return Err(Diverged);
            }
            c[i] = e.exp() - 1.0 - gamma[i];
        }
        Ok(c)
    }

    /// One application of closure plus OZ.
    fn picard(&self, beta_u: &DVector<f64>, gamma: &DVector<f64>, rho: f64) -> Result<DVector<f64>, Diverged> {
        let c_hat = self.forward(&Self::direct_correlation(beta_u, gamma)?);
        let mut gamma_hat = DVector::zeros(c_hat.len());
        for (j, &cj) in c_hat.iter().enumerate() {
            let denom = 1.0 - rho * cj;
            if !(denom > 0.0) {
                return Err(Diverged);
            }
            gamma_hat[j] = rho * cj * cj / denom;
        }
        Ok(self.inverse(&gamma_hat))
    }

    fn converge(
        &self,
        beta_u: &DVector<f64>,
        mut gamma: DVector<f64>,
        rho: f64,
    ) -> Result<(DVector<f64>, usize), Diverged> {
        let cfg = &self.config;
        let mut history: VecDeque<(DVector<f64>, DVector<f64>)> = VecDeque::with_capacity(3);
        for iteration in 1..=cfg.max_iterations {
            let out = self.picard(beta_u, &gamma, rho)?;
            let delta = &out - &gamma;
            let change = delta.amax();
            if !change.is_finite() {
                return Err(Diverged);
            }
            if change < cfg.tolerance {
                return Ok((out, iteration));
            }
            if history.len() == 3 {
                history.pop_front();
            }
            history.push_back((out, delta));
            gamma = match ng_extrapolate(&history) {
                Some(next) => next,
                None => {
                    let (out, _) = &history[history.len() - 1];
                    out * cfg.mixing + &gamma * (1.0 - cfg.mixing)
                }
            };
        }
        Err(Diverged)
    }

    /// Solve at number density `rho` for a pair potential given as `βu(r)`.
    pub fn solve(&self, beta_u: impl Fn(f64) -> f64, rho: f64) -> ReferenceResult<HncSolution> {
        let rho = positive(rho, "hnc density")?;
        let cfg = &self.config;
        let beta_u = self.r.map(&beta_u);

        let mut gamma = DVector::zeros(self.r.len());
        let mut reached = 0.0;
        let mut step = cfg.density_step.min(rho);
        let mut iterations = 0;
        while reached < rho {
            let next = (reached + step).min(rho);
            match self.converge(&beta_u, gamma.clone(), next) {
                Ok((g, n)) => {
                    trace!(rho = next, iterations = n, "hnc step converged");
                    gamma = g;
                    reached = next;
                    iterations += n;
                    step = (2.0 * step).min(cfg.density_step);
                }
                Err(Diverged) => {
                    step *= 0.5;
                    debug!(rho = next, step, "hnc step diverged, halving");
                    if step < cfg.min_density_step {
                        return Err(ReferenceError::InvalidParameter {
                            what: "hnc density",
                            value: next,
                        });
                    }
                }
            }
        }

        let c = Self::direct_correlation(&beta_u, &gamma).map_err(|_| ReferenceError::NonFinite {
            what: "hnc direct correlation",
        })?;
        let h = &c + &gamma;
        Ok(HncSolution {
            rho,
            dr: cfg.spacing,
            r: self.r.clone(),
            c,
            h,
            iterations,
        })
    }
}

/// Ng's two-step extrapolation over the last three `(output, residual)` pairs.
fn ng_extrapolate(history: &VecDeque<(DVector<f64>, DVector<f64>)>) -> Option<DVector<f64>> {
    if history.len() < 3 {
        return None;
    }
    let (f2, d2) = &history[0];
    let (f1, d1) = &history[1];
    let (f0, d0) = &history[2];
    let a1 = d0 - d1;
    let a2 = d0 - d2;
    let m = Matrix2::new(a1.dot(&a1), a1.dot(&a2), a1.dot(&a2), a2.dot(&a2));
    let det = m.determinant();
    if !(det > 1e-12 * m[(0, 0)] * m[(1, 1)]) {
        return None;
    }
    let rhs = Vector2::new(d0.dot(&a1), d0.dot(&a2));
    let coef = m.lu().solve(&rhs)?;
    let (c1, c2) = (coef[0], coef[1]);
    Some(f0 * (1.0 - c1 - c2) + f1 * c1 + f2 * c2)
}

/// Converged correlation functions at one density.
#[derive(Debug, Clone)]
pub struct HncSolution {
    rho: f64,
    dr: f64,
    r: DVector<f64>,
    c: DVector<f64>,
    h: DVector<f64>,
    iterations: usize,
}

impl HncSolution {
    pub fn density(&self) -> f64 {
        self.rho
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn radii(&self) -> &DVector<f64> {
        &self.r
    }

    /// `g(r) = h(r) + 1`
    pub fn pair_correlation(&self) -> DVector<f64> {
        self.h.add_scalar(1.0)
    }

    /// `βμ_ex = ρ ∫ (h²/2 - c - hc/2) d³r`
    pub fn excess_chemical_potential(&self) -> f64 {
        let sum: f64 = (0..self.r.len())
            .map(|i| {
                let (r, h, c) = (self.r[i], self.h[i], self.c[i]);
                r * r * (0.5 * h * h - c - 0.5 * h * c)
            })
            .sum();
        4.0 * PI * self.rho * self.dr * sum
    }

    /// `βP/ρ = 1 - (2πρ/3) ∫ r³ βu'(r) g(r) dr`
    pub fn compressibility_factor(&self, beta_du: impl Fn(f64) -> f64) -> f64 {
        let sum: f64 = (0..self.r.len())
            .map(|i| {
                let g = self.h[i] + 1.0;
                if g == 0.0 {
                    0.0
                } else {
                    self.r[i].powi(3) * beta_du(self.r[i]) * g
                }
            })
            .sum();
        1.0 - 2.0 * PI * self.rho / 3.0 * self.dr * sum
    }

    /// `β f_ex = βμ_ex - (βP/ρ - 1)`, given the potential's derivative `βu'(r)`.
    pub fn excess_free_energy(&self, beta_du: impl Fn(f64) -> f64) -> ReferenceResult<f64> {
        finite(
            self.excess_chemical_potential() - (self.compressibility_factor(beta_du) - 1.0),
            "hnc excess free energy",
        )
    }
}
