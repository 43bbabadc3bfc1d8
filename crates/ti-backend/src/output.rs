//! Running averages the engine prints during equilibration (`avg.dat`).

use crate::error::{BackendError, BackendResult};
use std::fs;
use std::path::Path;

/// One `step press vol temp [msd]` line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageRow {
    pub step: u64,
    /// [bar]
    pub pressure: f64,
    /// [Å³]
    pub volume: f64,
    /// [K]
    pub temperature: f64,
    /// Mean squared displacement [Å²], when sampled.
    pub msd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AverageSeries {
    rows: Vec<AverageRow>,
}

impl AverageSeries {
    pub fn new(rows: Vec<AverageRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[AverageRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn read(path: &Path) -> BackendResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::MissingOutput {
                    path: path.to_path_buf(),
                }
            } else {
                BackendError::io(path, e)
            }
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, origin: &Path) -> BackendResult<Self> {
        let mut rows = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let bad = || BackendError::Parse {
                path: origin.to_path_buf(),
                line: i + 1,
                reason: format!("expected `step press vol temp [msd]`, got `{line}`"),
            };
            let v: Vec<f64> = line
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|_| bad())?;
            if v.len() < 4 || v.iter().any(|x| !x.is_finite()) {
                return Err(bad());
            }
            rows.push(AverageRow {
                step: v[0] as u64,
                pressure: v[1],
                volume: v[2],
                temperature: v[3],
                msd: v.get(4).copied(),
            });
        }
        Ok(Self { rows })
    }

    fn trailing(&self, window: usize) -> &[AverageRow] {
        let start = self.rows.len().saturating_sub(window);
        &self.rows[start..]
    }

    /// Mean volume over the last `window` rows.
    pub fn mean_volume(&self, window: usize) -> Option<f64> {
        ti_core::mean_and_std(&self.trailing(window).iter().map(|r| r.volume).collect::<Vec<_>>())
            .map(|(m, _)| m)
    }

    pub fn mean_pressure(&self, window: usize) -> Option<f64> {
        ti_core::mean_and_std(&self.trailing(window).iter().map(|r| r.pressure).collect::<Vec<_>>())
            .map(|(m, _)| m)
    }

    /// Mean MSD over the last `window` rows; `None` if any row lacks it.
    pub fn mean_msd(&self, window: usize) -> Option<f64> {
        let msd: Option<Vec<f64>> = self.trailing(window).iter().map(|r| r.msd).collect();
        ti_core::mean_and_std(&msd?).map(|(m, _)| m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_window_mean() {
        let mut text = String::from("# step press vol temp\n");
        for i in 0..150 {
            let vol = if i < 50 { 1000.0 } else { 1200.0 };
            text.push_str(&format!("{} 0.5 {} 500\n", i * 10, vol));
        }
        let s = AverageSeries::parse(&text, Path::new("avg.dat")).unwrap();
        assert_eq!(s.len(), 150);
        assert_eq!(s.mean_volume(100), Some(1200.0));
        assert_eq!(s.mean_volume(1000), Some((50.0 * 1000.0 + 100.0 * 1200.0) / 150.0));
        assert_eq!(s.mean_msd(100), None);
    }

    #[test]
    fn msd_column() {
        let s = AverageSeries::parse("0 1 10 300 0.02\n10 1 10 300 0.04\n", Path::new("avg.dat")).unwrap();
        assert!((s.mean_msd(100).unwrap() - 0.03).abs() < 1e-15);
    }

    #[test]
    fn empty_has_no_mean() {
        let s = AverageSeries::parse("", Path::new("avg.dat")).unwrap();
        assert!(s.mean_volume(100).is_none());
    }

    #[test]
    fn short_rows_rejected() {
        assert!(AverageSeries::parse("0 1 10\n", Path::new("avg.dat")).is_err());
    }
}
