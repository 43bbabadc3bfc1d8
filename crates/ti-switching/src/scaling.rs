//! Reversible scaling: one switching run maps F(T0) onto a temperature range.
//!
//! Scaling the potential energy by λ at temperature T0 samples the same
//! configurations as the unscaled system at T0/λ. Along each leg the
//! cumulative work gives
//!
//! ```text
//! F(T0/λ) = F0/λ + 1.5 k_B T0 ln(λ)/λ + w(λ)/λ
//! ```
//!
//! with `w` the hysteresis-corrected mean of the forward leg and the
//! reversed backward leg.

use crate::error::{SwitchingError, SwitchingResult};
use crate::integrator::check_leg;
use crate::protocol::SwitchingProtocol;
use crate::series::{SwitchingSample, SwitchingSeries};
use std::fmt::Write as _;
use std::path::Path;
use ti_core::units::constants::KB_EV_PER_K;

const LAMBDA_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub temperature: f64,
    pub free_energy: f64,
    pub error: f64,
}

/// Free energy as a function of temperature, ordered as recorded (from T0).
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSweep {
    points: Vec<SweepPoint>,
}

impl TemperatureSweep {
    pub fn points(&self) -> &[SweepPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `temperature_sweep.dat`: three columns, T, F and σ_F.
    pub fn write_dat(&self, path: &Path) -> SwitchingResult<()> {
        let mut out = String::from("# temperature free_energy error\n");
        for p in &self.points {
            let _ = writeln!(out, "{:.6} {:.10} {:.10}", p.temperature, p.free_energy, p.error);
        }
        std::fs::write(path, out).map_err(|source| SwitchingError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn cumulative_trapezoid(samples: &[SwitchingSample]) -> Vec<f64> {
    let mut acc = 0.0;
    let mut out = Vec::with_capacity(samples.len());
    out.push(0.0);
    for w in samples.windows(2) {
        acc += 0.5 * (w[1].lambda - w[0].lambda) * (w[0].work_density + w[1].work_density);
        out.push(acc);
    }
    out
}

/// Cumulative work `(λ, w_f, w_b)` of one replicate along the forward grid.
fn replicate_work(
    forward: &SwitchingSeries,
    backward: &SwitchingSeries,
    protocol: &SwitchingProtocol,
) -> SwitchingResult<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    let (start, end) = (protocol.lambda_start(), protocol.lambda_end());
    check_leg(forward, start, end, LAMBDA_TOLERANCE)?;
    check_leg(backward, end, start, LAMBDA_TOLERANCE)?;

    let reversed = backward.reversed();
    if reversed.len() != forward.len() {
        return Err(SwitchingError::MalformedSeries {
            direction: backward.direction(),
            replicate: backward.replicate(),
            reason: format!(
                "{} samples, forward leg has {}",
                reversed.len(),
                forward.len()
            ),
        });
    }
    if let Some((f, b)) = forward
        .samples()
        .iter()
        .zip(&reversed)
        .find(|(f, b)| (f.lambda - b.lambda).abs() > LAMBDA_TOLERANCE)
    {
        return Err(SwitchingError::MalformedSeries {
            direction: backward.direction(),
            replicate: backward.replicate(),
            reason: format!("lambda {} does not match forward lambda {}", b.lambda, f.lambda),
        });
    }

    let lambdas = forward.samples().iter().map(|s| s.lambda).collect();
    Ok((
        lambdas,
        cumulative_trapezoid(forward.samples()),
        cumulative_trapezoid(&reversed),
    ))
}

/// Temperature sweep from `rs_forward_<i>`/`rs_backward_<i>` pairs, starting
/// from `f0` [eV/atom] at `t0` [K].
pub fn integrate_reversible_scaling(
    forward: &[SwitchingSeries],
    backward: &[SwitchingSeries],
    protocol: &SwitchingProtocol,
    t0: f64,
    f0: f64,
) -> SwitchingResult<TemperatureSweep> {
    if forward.is_empty() {
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
    if !(t0.is_finite() && t0 > 0.0) {
        return Err(SwitchingError::InvalidProtocol {
            what: "sweep start temperature must be positive",
        });
    }

    let mut lambdas: Option<Vec<f64>> = None;
    let mut per_replicate: Vec<(Vec<f64>, Vec<f64>)> = Vec::with_capacity(forward.len());
    for f in forward {
        let b = backward
            .iter()
            .find(|b| b.replicate() == f.replicate())
            .ok_or_else(|| SwitchingError::ReplicateMismatch {
                reason: format!("no backward series for replicate {}", f.replicate()),
            })?;
        let (l, wf, wb) = replicate_work(f, b, protocol)?;
        match &lambdas {
            Some(existing) if existing.len() != l.len() => {
                return Err(SwitchingError::ReplicateMismatch {
                    reason: format!(
                        "replicate {} has {} samples, others have {}",
                        f.replicate(),
                        l.len(),
                        existing.len()
                    ),
                });
            }
            Some(_) => {}
            None => lambdas = Some(l),
        }
        per_replicate.push((wf, wb));
    }
    let lambdas = lambdas.unwrap_or_default();
    let n = per_replicate.len();

    let mut points = Vec::with_capacity(lambdas.len());
    for (k, &lambda) in lambdas.iter().enumerate() {
        let ws: Vec<f64> = per_replicate
            .iter()
            .map(|(wf, wb)| 0.5 * (wf[k] + wb[k]))
            .collect();
        let (w, std) = ti_core::mean_and_std(&ws).ok_or(SwitchingError::NoReplicates)?;
        let spread = if n == 1 {
            let (wf, wb) = &per_replicate[0];
            0.5 * (wf[k] - wb[k]).abs()
        } else {
            std / (n as f64).sqrt()
        };
        points.push(SweepPoint {
            temperature: t0 / lambda,
            free_energy: f0 / lambda + 1.5 * KB_EV_PER_K * t0 * lambda.ln() / lambda + w / lambda,
            error: spread / lambda,
        });
    }
    Ok(TemperatureSweep { points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Direction;

    fn leg(direction: Direction, replicate: usize, end: f64, n: usize, du: impl Fn(f64) -> f64) -> SwitchingSeries {
        let samples = (0..=n)
            .map(|i| {
                let s = i as f64 / n as f64;
                let lambda = match direction {
                    Direction::Forward => 1.0 + (end - 1.0) * s,
                    Direction::Backward => end + (1.0 - end) * s,
                };
                SwitchingSample::new(du(lambda), lambda)
            })
            .collect();
        SwitchingSeries::new(direction, replicate, samples)
    }

    #[test]
    fn first_point_is_the_anchor() {
        let p = SwitchingProtocol::reversible_scaling(0, 100, 1, 1, 500.0, 1000.0).unwrap();
        let f = leg(Direction::Forward, 1, 0.5, 50, |_| -3.0);
        let b = leg(Direction::Backward, 1, 0.5, 50, |_| -3.0);
        let sweep = integrate_reversible_scaling(&[f], &[b], &p, 500.0, -4.0).unwrap();
        let first = sweep.points()[0];
        assert_eq!(first.temperature, 500.0);
        assert!((first.free_energy + 4.0).abs() < 1e-12);
        let last = sweep.points()[sweep.len() - 1];
        assert!((last.temperature - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn constant_energy_closed_form() {
        // dU = u constant: w(λ) = u (λ - 1)
        let (t0, f0, u) = (600.0, -3.5, -3.2);
        let p = SwitchingProtocol::reversible_scaling(0, 100, 1, 1, t0, 1200.0).unwrap();
        let f = leg(Direction::Forward, 1, 0.5, 40, |_| u);
        let b = leg(Direction::Backward, 1, 0.5, 40, |_| u);
        let sweep = integrate_reversible_scaling(&[f], &[b], &p, t0, f0).unwrap();
        for pt in sweep.points() {
            let l = t0 / pt.temperature;
            let expected = f0 / l + 1.5 * KB_EV_PER_K * t0 * l.ln() / l + u * (l - 1.0) / l;
            assert!((pt.free_energy - expected).abs() < 1e-10);
            assert!(pt.error < 1e-12);
        }
    }

    #[test]
    fn mismatched_grids_are_malformed() {
        let p = SwitchingProtocol::reversible_scaling(0, 100, 1, 1, 500.0, 1000.0).unwrap();
        let f = leg(Direction::Forward, 1, 0.5, 50, |_| -3.0);
        let b = leg(Direction::Backward, 1, 0.5, 40, |_| -3.0);
        let err = integrate_reversible_scaling(&[f], &[b], &p, 500.0, -4.0).unwrap_err();
        assert_eq!(err.kind(), ti_core::ErrorKind::MalformedSeries);
    }

    #[test]
    fn writes_three_columns() {
        let p = SwitchingProtocol::reversible_scaling(0, 10, 1, 1, 500.0, 1000.0).unwrap();
        let f = leg(Direction::Forward, 1, 0.5, 10, |l| -3.0 * l);
        let b = leg(Direction::Backward, 1, 0.5, 10, |l| -3.0 * l);
        let sweep = integrate_reversible_scaling(&[f], &[b], &p, 500.0, -4.0).unwrap();
        let dir = std::env::temp_dir().join(format!("ti_switching_sweep_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("temperature_sweep.dat");
        sweep.write_dat(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows.len(), 11);
        assert!(rows.iter().all(|r| r.split_whitespace().count() == 3));
        std::fs::remove_dir_all(&dir).ok();
    }
}
