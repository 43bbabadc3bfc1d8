use crate::TiError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, TiError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(TiError::NonFinite { what, value: v })
    }
}

/// Finite and strictly positive, the domain of every physical input here.
pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, TiError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(TiError::InvalidArg { what })
    }
}

/// Arithmetic mean and population standard deviation.
///
/// Returns `None` for an empty slice.
pub fn mean_and_std(values: &[Real]) -> Option<(Real, Real)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as Real;
    let mean = values.iter().sum::<Real>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<Real>() / n;
    Some((mean, var.sqrt()))
}

/// Composite Simpson rule over a uniform grid of `intervals` (rounded up to even).
pub fn simpson<F: Fn(Real) -> Real>(f: F, a: Real, b: Real, intervals: usize) -> Real {
    let mut n = intervals.max(2);
    if n % 2 == 1 {
        n += 1;
    }
    let h = (b - a) / n as Real;
    let mut sum = f(a) + f(b);
    for i in 1..n {
        let w = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += w * f(a + h * i as Real);
    }
    sum * h / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_positive_rejects_zero() {
        assert!(ensure_positive(0.0, "rho").is_err());
        assert!(ensure_positive(-1.0, "rho").is_err());
        assert_eq!(ensure_positive(2.5, "rho").unwrap(), 2.5);
    }

    #[test]
    fn mean_and_std_population() {
        let (m, s) = mean_and_std(&[1.0, 3.0]).unwrap();
        assert!(nearly_equal(m, 2.0, Tolerances::default()));
        assert!(nearly_equal(s, 1.0, Tolerances::default()));
        assert!(mean_and_std(&[]).is_none());
    }

    #[test]
    fn simpson_is_exact_on_cubics() {
        let v = simpson(|x| x * x * x - 2.0 * x, 0.0, 2.0, 4);
        assert!(nearly_equal(v, 0.0, Tolerances::default()));
        let v = simpson(|x| x * x, 0.0, 3.0, 7);
        assert!(nearly_equal(v, 9.0, Tolerances::default()));
    }
}
