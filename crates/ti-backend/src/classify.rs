//! Steinhardt q6 bond-order classification of solid-like atoms.
//!
//! Two neighbours form a solid bond when the normalised overlap of their
//! local q6 vectors exceeds `bond_threshold`; atoms with at least
//! `min_solid_bonds` such bonds are solid-like. The reported fraction is
//! the largest connected cluster of solid-like atoms over all atoms.

use crate::error::{BackendError, BackendResult};
use crate::snapshot::Snapshot;
use crate::traits::PhaseClassifier;
use num_complex::Complex64;
use rayon::prelude::*;
use std::f64::consts::PI;

const L: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct SteinhardtClassifier {
    /// Neighbour cutoff [Å]; `None` derives one from the density.
    pub cutoff: Option<f64>,
    pub bond_threshold: f64,
    pub min_solid_bonds: usize,
}

impl Default for SteinhardtClassifier {
    fn default() -> Self {
        Self {
            cutoff: None,
            bond_threshold: 0.5,
            min_solid_bonds: 7,
        }
    }
}

impl SteinhardtClassifier {
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    /// Midway between the first and second FCC shells at this density.
    pub fn cutoff_for_density(density: f64) -> f64 {
        let a = (4.0 / density).cbrt();
        1.25 * a / 2f64.sqrt()
    }

    fn neighbours(&self, snapshot: &Snapshot, cutoff: f64) -> Vec<Vec<usize>> {
        let cut2 = cutoff * cutoff;
        let atoms = &snapshot.atoms;
        (0..atoms.len())
            .into_par_iter()
            .map(|i| {
                (0..atoms.len())
                    .filter(|&j| {
                        j != i
                            && snapshot
                                .minimum_image(&atoms[i].position, &atoms[j].position)
                                .norm_squared()
                                < cut2
                    })
                    .collect()
            })
            .collect()
    }

    /// Per-atom `q6m` vectors normalised to unit length; zero for isolated atoms.
    fn q6_vectors(snapshot: &Snapshot, neighbours: &[Vec<usize>]) -> Vec<[Complex64; 2 * L + 1]> {
        let atoms = &snapshot.atoms;
        neighbours
            .par_iter()
            .enumerate()
            .map(|(i, nbrs)| {
                let mut q = [Complex64::new(0.0, 0.0); 2 * L + 1];
                if nbrs.is_empty() {
                    return q;
                }
                for &j in nbrs {
                    let d = snapshot.minimum_image(&atoms[i].position, &atoms[j].position);
                    let r = d.norm();
                    let theta = (d.z / r).clamp(-1.0, 1.0).acos();
                    let phi = d.y.atan2(d.x);
                    for (k, m) in (-(L as i32)..=L as i32).enumerate() {
                        q[k] += y_lm(L, m, theta, phi);
                    }
                }
                let norm = q.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for c in &mut q {
                        *c /= norm;
                    }
                }
                q
            })
            .collect()
    }
}

impl PhaseClassifier for SteinhardtClassifier {
    fn classify_phase_fraction(&self, snapshot: &Snapshot) -> BackendResult<f64> {
        let n = snapshot.natoms();
        if n == 0 {
            return Err(BackendError::InvalidInput {
                what: "snapshot has no atoms".to_string(),
            });
        }
        let cutoff = self
            .cutoff
            .unwrap_or_else(|| Self::cutoff_for_density(snapshot.density()));
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(BackendError::InvalidInput {
                what: format!("neighbour cutoff {cutoff}"),
            });
        }

        let neighbours = self.neighbours(snapshot, cutoff);
        let q = Self::q6_vectors(snapshot, &neighbours);

        let solid: Vec<bool> = neighbours
            .par_iter()
            .enumerate()
            .map(|(i, nbrs)| {
                let bonds = nbrs
                    .iter()
                    .filter(|&&j| {
                        let overlap: f64 = q[i]
                            .iter()
                            .zip(&q[j])
                            .map(|(a, b)| (a * b.conj()).re)
                            .sum();
                        overlap > self.bond_threshold
                    })
                    .count();
                bonds >= self.min_solid_bonds
            })
            .collect();

        Ok(largest_cluster(&neighbours, &solid) as f64 / n as f64)
    }
}

/// Size of the largest connected set of solid atoms.
fn largest_cluster(neighbours: &[Vec<usize>], solid: &[bool]) -> usize {
    let mut seen = vec![false; solid.len()];
    let mut best = 0;
    let mut stack = Vec::new();
    for start in 0..solid.len() {
        if !solid[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        stack.push(start);
        let mut size = 0;
        while let Some(i) = stack.pop() {
            size += 1;
            for &j in &neighbours[i] {
                if solid[j] && !seen[j] {
                    seen[j] = true;
                    stack.push(j);
                }
            }
        }
        best = best.max(size);
    }
    best
}

/// Spherical harmonic `Y_l^m(θ, φ)` with the Condon–Shortley phase.
fn y_lm(l: usize, m: i32, theta: f64, phi: f64) -> Complex64 {
    let order = m.unsigned_abs() as usize;
    let x = theta.cos();
    let norm = (((2 * l + 1) as f64) * factorial_ratio(l, order) / (4.0 * PI)).sqrt();
    let positive = Complex64::from_polar(1.0, order as f64 * phi) * (norm * legendre(l, order, x));
    if m >= 0 {
        positive
    } else if order % 2 == 0 {
        positive.conj()
    } else {
        -positive.conj()
    }
}

/// Associated Legendre `P_l^m(x)` by upward recurrence in `l`.
fn legendre(l: usize, m: usize, x: f64) -> f64 {
    let mut p_mm = 1.0;
    if m > 0 {
        let root = (1.0 - x * x).max(0.0).sqrt();
        for k in 1..=m {
            p_mm *= -((2 * k - 1) as f64) * root;
        }
    }
    if l == m {
        return p_mm;
    }
    let mut p_prev = p_mm;
    let mut p_cur = x * ((2 * m + 1) as f64) * p_mm;
    for ll in (m + 2)..=l {
        let next = (((2 * ll - 1) as f64) * x * p_cur - ((ll + m - 1) as f64) * p_prev) / (ll - m) as f64;
        p_prev = p_cur;
        p_cur = next;
    }
    p_cur
}

/// `(l - m)! / (l + m)!`
fn factorial_ratio(l: usize, m: usize) -> f64 {
    ((l - m + 1)..=(l + m)).fold(1.0, |acc, t| acc / t as f64)
}
