//! Work integration over switching legs.
//!
//! Each leg is integrated in the order it was recorded, so a leg running
//! 1 → 0 contributes `∫₁⁰ dU dλ`. Per replicate the dissipation cancels in
//! `W_i = (W_fwd - W_bwd) / 2`; the estimate is the mean over replicates
//! with the standard error of the mean as its uncertainty.

use crate::error::{SwitchingError, SwitchingResult};
use crate::series::{SwitchingSample, SwitchingSeries};
use tracing::debug;

/// Ordered quadrature of `dU` over `λ`.
pub trait Quadrature {
    /// Integral in sample order; samples are at least two, λ monotonic.
    fn integrate(&self, samples: &[SwitchingSample]) -> f64;
}

/// Composite trapezoid rule.
#[derive(Clone, Copy, Debug)]
pub struct Trapezoid;

impl Quadrature for Trapezoid {
    fn integrate(&self, samples: &[SwitchingSample]) -> f64 {
        samples
            .windows(2)
            .map(|w| 0.5 * (w[1].lambda - w[0].lambda) * (w[0].work_density + w[1].work_density))
            .sum()
    }
}

/// Composite Simpson rule on a possibly non-uniform grid.
///
/// λ values closer than `tie_tolerance` are merged first. With an odd number
/// of intervals the last one falls back to the trapezoid rule.
#[derive(Clone, Copy, Debug)]
pub struct Simpson {
    pub tie_tolerance: f64,
}

impl Default for Simpson {
    fn default() -> Self {
        Self { tie_tolerance: 1e-12 }
    }
}

impl Simpson {
    pub fn with_tolerance(tie_tolerance: f64) -> Self {
        Self { tie_tolerance }
    }
}

impl Quadrature for Simpson {
    fn integrate(&self, samples: &[SwitchingSample]) -> f64 {
        let pts = merge_ties(samples, self.tie_tolerance);
        let mut total = 0.0;
        let mut i = 0;
        while i + 2 < pts.len() {
            let (a, b, c) = (pts[i], pts[i + 1], pts[i + 2]);
            let h0 = b.lambda - a.lambda;
            let h1 = c.lambda - b.lambda;
            total += (h0 + h1) / 6.0
                * ((2.0 - h1 / h0) * a.work_density
                    + (h0 + h1).powi(2) / (h0 * h1) * b.work_density
                    + (2.0 - h0 / h1) * c.work_density);
            i += 2;
        }
        if i + 1 < pts.len() {
            total += Trapezoid.integrate(&pts[i..]);
        }
        total
    }
}

/// Collapse runs of λ within `tol` of the run's first value into one sample
/// with the mean dU.
fn merge_ties(samples: &[SwitchingSample], tol: f64) -> Vec<SwitchingSample> {
    let mut out: Vec<SwitchingSample> = Vec::with_capacity(samples.len());
    let mut count = 0usize;
    for s in samples {
        match out.last_mut() {
            Some(last) if (s.lambda - last.lambda).abs() <= tol => {
                count += 1;
                last.work_density += (s.work_density - last.work_density) / count as f64;
            }
            _ => {
                out.push(*s);
                count = 1;
            }
        }
    }
    out
}

/// Quadrature selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QuadratureRule {
    #[default]
    Trapezoid,
    /// Exact for piecewise quadratics; same as trapezoid on linear data.
    Simpson,
}

impl QuadratureRule {
    pub fn integrate(self, samples: &[SwitchingSample]) -> f64 {
        self.integrate_within(samples, Simpson::default().tie_tolerance)
    }

    /// As [`integrate`](Self::integrate), treating λ closer than `tol` as repeated.
    pub fn integrate_within(self, samples: &[SwitchingSample], tol: f64) -> f64 {
        match self {
            QuadratureRule::Trapezoid => Trapezoid.integrate(samples),
            QuadratureRule::Simpson => Simpson::with_tolerance(tol).integrate(samples),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntegratorOptions {
    pub quadrature: QuadratureRule,
    /// λ where the forward leg starts.
    pub lambda_start: f64,
    /// λ where the forward leg ends.
    pub lambda_end: f64,
    /// Allowed mismatch of the leg endpoints and of monotonicity.
    pub span_tolerance: f64,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            quadrature: QuadratureRule::default(),
            lambda_start: 1.0,
            lambda_end: 0.0,
            span_tolerance: 1e-6,
        }
    }
}

/// Work of one replicate.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicateWork {
    pub replicate: usize,
    pub forward: f64,
    pub backward: f64,
    /// `(forward - backward) / 2`
    pub work: f64,
}

impl ReplicateWork {
    /// Energy dissipated over the round trip.
    pub fn dissipation(&self) -> f64 {
        self.forward + self.backward
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkEstimate {
    /// Reversible work W [eV/atom].
    pub work: f64,
    /// Non-negative uncertainty σ_W.
    pub error: f64,
    pub replicates: Vec<ReplicateWork>,
}

/// Integrate with default options (trapezoid, forward leg 1 → 0).
pub fn integrate_work(
    forward: &[SwitchingSeries],
    backward: &[SwitchingSeries],
) -> SwitchingResult<WorkEstimate> {
    integrate_work_with(forward, backward, &IntegratorOptions::default())
}

pub fn integrate_work_with(
    forward: &[SwitchingSeries],
    backward: &[SwitchingSeries],
    opts: &IntegratorOptions,
) -> SwitchingResult<WorkEstimate> {
    if forward.is_empty() && backward.is_empty() {
        return Err(SwitchingError::NoReplicates);
    }
    if forward.len() != backward.len() {
        return Err(SwitchingError::ReplicateMismatch {
            reason: format!(
                "{} forward series vs {} backward series",
                forward.len(),
                backward.len()
            ),
        });
    }

    let mut fwd: Vec<&SwitchingSeries> = forward.iter().collect();
    let mut bwd: Vec<&SwitchingSeries> = backward.iter().collect();
    fwd.sort_by_key(|s| s.replicate());
    bwd.sort_by_key(|s| s.replicate());

    let mut replicates = Vec::with_capacity(fwd.len());
    for (f, b) in fwd.into_iter().zip(bwd) {
        if f.replicate() != b.replicate() {
            return Err(SwitchingError::ReplicateMismatch {
                reason: format!(
                    "forward replicate {} paired with backward replicate {}",
                    f.replicate(),
                    b.replicate()
                ),
            });
        }
        check_leg(f, opts.lambda_start, opts.lambda_end, opts.span_tolerance)?;
        check_leg(b, opts.lambda_end, opts.lambda_start, opts.span_tolerance)?;

        let w_f = opts.quadrature.integrate_within(f.samples(), opts.span_tolerance);
        let w_b = opts.quadrature.integrate_within(b.samples(), opts.span_tolerance);
        let rw = ReplicateWork {
            replicate: f.replicate(),
            forward: w_f,
            backward: w_b,
            work: 0.5 * (w_f - w_b),
        };
        debug!(
            replicate = rw.replicate,
            forward = w_f,
            backward = w_b,
            dissipation = rw.dissipation(),
            "integrated replicate"
        );
        replicates.push(rw);
    }

    let works: Vec<f64> = replicates.iter().map(|r| r.work).collect();
    let (work, std) = ti_core::mean_and_std(&works).ok_or(SwitchingError::NoReplicates)?;
    let error = if replicates.len() == 1 {
        0.5 * replicates[0].dissipation().abs()
    } else {
        std / (replicates.len() as f64).sqrt()
    };
    Ok(WorkEstimate {
        work,
        error,
        replicates,
    })
}

/// At least two samples, endpoints within tolerance, λ monotonic from `from` to `to`.
pub(crate) fn check_leg(series: &SwitchingSeries, from: f64, to: f64, tol: f64) -> SwitchingResult<()> {
    let malformed = |reason: String| SwitchingError::MalformedSeries {
        direction: series.direction(),
        replicate: series.replicate(),
        reason,
    };
    let samples = series.samples();
    if samples.len() < 2 {
        return Err(SwitchingError::InsufficientData {
            direction: series.direction(),
            replicate: series.replicate(),
            samples: samples.len(),
        });
    }
    let (first, last) = (samples[0].lambda, samples[samples.len() - 1].lambda);
    if (first - from).abs() > tol || (last - to).abs() > tol {
        return Err(malformed(format!(
            "lambda runs {first} -> {last}, expected {from} -> {to}"
        )));
    }
    let sign = (to - from).signum();
    if let Some(w) = samples
        .windows(2)
        .find(|w| sign * (w[1].lambda - w[0].lambda) < -tol)
    {
        return Err(malformed(format!(
            "lambda not monotonic at {} -> {}",
            w[0].lambda, w[1].lambda
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Direction;

    fn ramp(direction: Direction, replicate: usize, n: usize, du: impl Fn(f64) -> f64) -> SwitchingSeries {
        let samples = (0..=n)
            .map(|i| {
                let s = i as f64 / n as f64;
                let lambda = match direction {
                    Direction::Forward => 1.0 - s,
                    Direction::Backward => s,
                };
                SwitchingSample::new(du(lambda), lambda)
            })
            .collect();
        SwitchingSeries::new(direction, replicate, samples)
    }

    #[test]
    fn linear_integrand_is_exact() {
        // ∫₀¹ (2λ + 1) dλ = 2, so the forward leg gives -2
        let f = ramp(Direction::Forward, 1, 7, |l| 2.0 * l + 1.0);
        let b = ramp(Direction::Backward, 1, 7, |l| 2.0 * l + 1.0);
        for rule in [QuadratureRule::Trapezoid, QuadratureRule::Simpson] {
            let opts = IntegratorOptions {
                quadrature: rule,
                ..Default::default()
            };
            let est = integrate_work_with(&[f.clone()], &[b.clone()], &opts).unwrap();
            assert!((est.work + 2.0).abs() < 1e-12, "{rule:?}: {}", est.work);
            assert!(est.error < 1e-12);
        }
    }

    #[test]
    fn simpson_is_exact_on_quadratics_even_with_ties() {
        // engine prints the starting λ twice
        let mut samples = vec![SwitchingSample::new(3.0, 1.0)];
        samples.extend_from_slice(ramp(Direction::Forward, 1, 10, |l| 3.0 * l * l).samples());
        let v = Simpson::default().integrate(&samples);
        assert!((v + 1.0).abs() < 1e-12, "v = {v}");
    }

    #[test]
    fn simpson_merges_near_ties_within_span_tolerance() {
        // thermo output rounds λ, so the repeated start differs in the last digits
        let mut samples = vec![SwitchingSample::new(3.0, 1.0 - 1e-9)];
        samples.extend_from_slice(ramp(Direction::Forward, 1, 10, |l| 3.0 * l * l).samples());
        let v = Simpson::with_tolerance(1e-6).integrate(&samples);
        assert!((v + 1.0).abs() < 1e-8, "v = {v}");

        let f = SwitchingSeries::new(Direction::Forward, 1, samples);
        let b = ramp(Direction::Backward, 1, 10, |l| 3.0 * l * l);
        let opts = IntegratorOptions {
            quadrature: QuadratureRule::Simpson,
            ..Default::default()
        };
        let est = integrate_work_with(&[f], &[b], &opts).unwrap();
        assert!((est.work + 1.0).abs() < 1e-8, "work = {}", est.work);
        assert!(est.work.is_finite());
    }

    #[test]
    fn simpson_handles_odd_interval_count() {
        let s = ramp(Direction::Backward, 1, 5, |l| 4.0 * l);
        assert!((Simpson::default().integrate(s.samples()) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn hysteresis_cancels_in_the_mean() {
        // each leg does d more work than the reversible path
        let d = 0.1;
        let f = ramp(Direction::Forward, 1, 20, |l| l - d);
        let b = ramp(Direction::Backward, 1, 20, |l| l + d);
        let est = integrate_work(&[f], &[b]).unwrap();
        assert!((est.work + 0.5).abs() < 1e-12);
        assert!((est.error - d).abs() < 1e-12);
        assert!((est.replicates[0].dissipation() - 2.0 * d).abs() < 1e-12);
    }

    #[test]
    fn standard_error_over_replicates() {
        let f1 = ramp(Direction::Forward, 1, 4, |_| 1.0);
        let b1 = ramp(Direction::Backward, 1, 4, |_| 1.0);
        let f2 = ramp(Direction::Forward, 2, 4, |_| 3.0);
        let b2 = ramp(Direction::Backward, 2, 4, |_| 3.0);
        // replicate works -1 and -3, given out of order
        let est = integrate_work(&[f2, f1], &[b1, b2]).unwrap();
        assert!((est.work + 2.0).abs() < 1e-12);
        assert!((est.error - 1.0 / 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(est.replicates[0].replicate, 1);
    }

    #[test]
    fn single_point_is_insufficient() {
        let f = SwitchingSeries::new(Direction::Forward, 1, vec![SwitchingSample::new(1.0, 1.0)]);
        let b = ramp(Direction::Backward, 1, 4, |_| 1.0);
        let err = integrate_work(&[f], &[b]).unwrap_err();
        assert_eq!(err.kind(), ti_core::ErrorKind::InsufficientData);

        let empty = SwitchingSeries::new(Direction::Backward, 1, vec![]);
        let f = ramp(Direction::Forward, 1, 4, |_| 1.0);
        let err = integrate_work(&[f], &[empty]).unwrap_err();
        assert!(matches!(err, SwitchingError::InsufficientData { samples: 0, .. }));
    }

    #[test]
    fn non_monotonic_lambda_is_malformed() {
        let f = SwitchingSeries::new(
            Direction::Forward,
            1,
            vec![
                SwitchingSample::new(0.0, 1.0),
                SwitchingSample::new(0.0, 0.4),
                SwitchingSample::new(0.0, 0.6),
                SwitchingSample::new(0.0, 0.0),
            ],
        );
        let b = ramp(Direction::Backward, 1, 4, |_| 1.0);
        let err = integrate_work(&[f], &[b]).unwrap_err();
        assert_eq!(err.kind(), ti_core::ErrorKind::MalformedSeries);
    }

    #[test]
    fn partial_span_is_malformed() {
        let f = SwitchingSeries::new(
            Direction::Forward,
            1,
            vec![SwitchingSample::new(0.0, 1.0), SwitchingSample::new(0.0, 0.2)],
        );
        let b = ramp(Direction::Backward, 1, 4, |_| 1.0);
        assert!(matches!(
            integrate_work(&[f], &[b]),
            Err(SwitchingError::MalformedSeries { .. })
        ));
    }

    #[test]
    fn unpaired_replicates() {
        let f = ramp(Direction::Forward, 1, 4, |_| 1.0);
        let b = ramp(Direction::Backward, 2, 4, |_| 1.0);
        assert!(matches!(
            integrate_work(&[f.clone()], &[b]),
            Err(SwitchingError::ReplicateMismatch { .. })
        ));
        assert!(matches!(
            integrate_work(&[f], &[]),
            Err(SwitchingError::ReplicateMismatch { .. })
        ));
        assert!(matches!(integrate_work(&[], &[]), Err(SwitchingError::NoReplicates)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mirrored_legs_reproduce_single_leg(
                a in -5.0f64..5.0,
                b in -5.0f64..5.0,
                c in -5.0f64..5.0,
                n in 2usize..200,
            ) {
                let du = |l: f64| a + b * l + c * (3.0 * l).sin();
                let f = ramp(Direction::Forward, 1, n, du);
                let mirrored = SwitchingSeries::new(Direction::Backward, 1, f.reversed());
                let est = integrate_work(&[f.clone()], &[mirrored]).unwrap();
                let single = Trapezoid.integrate(f.samples());
                prop_assert!((est.work - single).abs() <= 1e-12 * single.abs().max(1.0));
                prop_assert!(est.error <= 1e-12 * single.abs().max(1.0));
            }

            #[test]
            fn trapezoid_converges_under_doubling(
                a in 0.5f64..3.0,
                n in 4usize..64,
            ) {
                let du = |l: f64| (a * l).exp();
                let exact = -((a).exp() - 1.0) / a;
                let coarse = Trapezoid.integrate(ramp(Direction::Forward, 1, n, du).samples());
                let fine = Trapezoid.integrate(ramp(Direction::Forward, 1, 2 * n, du).samples());
                let e1 = (coarse - exact).abs();
                let e2 = (fine - exact).abs();
                prop_assert!(e2 < e1);
                // second order: error shrinks by about 4
                prop_assert!(e1 / e2 > 3.5 && e1 / e2 < 4.5, "ratio {}", e1 / e2);
            }
        }
    }
}
