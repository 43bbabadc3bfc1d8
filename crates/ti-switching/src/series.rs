//! Work-density series recorded during a switching leg.
//!
//! On disk each line is `<dU> <λ>`; lines starting with `#` are headers
//! written by the engine's print fix. A file that does not end with a
//! newline is still being written and is reported as truncated.

use crate::error::{SwitchingError, SwitchingResult};
use core::fmt;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// System of interest → reference.
    Forward,
    /// Reference → system of interest.
    Backward,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which switching run produced a series; decides the file prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeriesFamily {
    /// Coupling to the reference system.
    #[default]
    Switching,
    /// Scaling the potential energy for a temperature sweep.
    ReversibleScaling,
}

impl SeriesFamily {
    fn prefix(self) -> &'static str {
        match self {
            SeriesFamily::Switching => "",
            SeriesFamily::ReversibleScaling => "rs_",
        }
    }
}

/// `forward_1.dat`, `rs_backward_3.dat`, ... Replicates count from 1.
pub fn series_file_name(family: SeriesFamily, direction: Direction, replicate: usize) -> String {
    format!("{}{}_{}.dat", family.prefix(), direction.label(), replicate)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchingSample {
    pub work_density: f64,
    pub lambda: f64,
}

impl SwitchingSample {
    pub fn new(work_density: f64, lambda: f64) -> Self {
        Self {
            work_density,
            lambda,
        }
    }
}

/// Samples of one leg of one replicate, in recorded order.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchingSeries {
    direction: Direction,
    replicate: usize,
    samples: Vec<SwitchingSample>,
}

impl SwitchingSeries {
    pub fn new(direction: Direction, replicate: usize, samples: Vec<SwitchingSample>) -> Self {
        Self {
            direction,
            replicate,
            samples,
        }
    }

    /// Read a series file written by the engine.
    pub fn read(path: &Path, direction: Direction, replicate: usize) -> SwitchingResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == IoErrorKind::NotFound {
                SwitchingError::MissingFile {
                    path: path.to_path_buf(),
                }
            } else {
                SwitchingError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(&text, path, direction, replicate)
    }

    /// Parse file contents; `origin` only labels errors. A file without a
    /// single sample counts as truncated.
    pub fn parse(
        text: &str,
        origin: &Path,
        direction: Direction,
        replicate: usize,
    ) -> SwitchingResult<Self> {
        if !text.is_empty() && !text.ends_with('\n') {
            return Err(SwitchingError::Truncated {
                path: origin.to_path_buf(),
                reason: "last line is incomplete",
            });
        }
        let mut samples = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parse_err = |reason: String| SwitchingError::Parse {
                path: origin.to_path_buf(),
                line: idx + 1,
                reason,
            };
            let mut fields = line.split_whitespace();
            let (Some(du), Some(lambda)) = (fields.next(), fields.next()) else {
                return Err(parse_err(format!("expected `<dU> <lambda>`, got `{line}`")));
            };
            let work_density: f64 = du
                .parse()
                .map_err(|_| parse_err(format!("bad work density `{du}`")))?;
            let lambda: f64 = lambda
                .parse()
                .map_err(|_| parse_err(format!("bad lambda `{lambda}`")))?;
            if !(work_density.is_finite() && lambda.is_finite()) {
                return Err(parse_err("non-finite value".to_string()));
            }
            samples.push(SwitchingSample::new(work_density, lambda));
        }
        if samples.is_empty() {
            return Err(SwitchingError::Truncated {
                path: origin.to_path_buf(),
                reason: "no samples were written",
            });
        }
        Ok(Self::new(direction, replicate, samples))
    }

    /// Write in the same `<dU> <λ>` layout the engine uses.
    pub fn write(&self, path: &Path) -> SwitchingResult<()> {
        let mut out = String::from("# dU lambda\n");
        for s in &self.samples {
            let _ = writeln!(out, "{:.10e} {:.10}", s.work_density, s.lambda);
        }
        fs::write(path, out).map_err(|source| SwitchingError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File this series lives in under `dir`.
    pub fn path_in(dir: &Path, family: SeriesFamily, direction: Direction, replicate: usize) -> PathBuf {
        dir.join(series_file_name(family, direction, replicate))
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn replicate(&self) -> usize {
        self.replicate
    }

    pub fn samples(&self) -> &[SwitchingSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `(first λ, last λ)`, if any samples exist.
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((self.samples.first()?.lambda, self.samples.last()?.lambda))
    }

    /// Same samples in reverse order.
    pub fn reversed(&self) -> Vec<SwitchingSample> {
        self.samples.iter().rev().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> &'static Path {
        Path::new("forward_1.dat")
    }

    #[test]
    fn file_names() {
        assert_eq!(
            series_file_name(SeriesFamily::Switching, Direction::Forward, 1),
            "forward_1.dat"
        );
        assert_eq!(
            series_file_name(SeriesFamily::ReversibleScaling, Direction::Backward, 2),
            "rs_backward_2.dat"
        );
    }

    #[test]
    fn parse_skips_headers_and_blank_lines() {
        let text = "# Fix print output for fix f5\n-0.5 1.0\n\n-0.25 0.5\n0.0 0.0\n";
        let s = SwitchingSeries::parse(text, origin(), Direction::Forward, 1).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.span(), Some((1.0, 0.0)));
        assert_eq!(s.samples()[1], SwitchingSample::new(-0.25, 0.5));
    }

    #[test]
    fn extra_columns_are_ignored() {
        let s = SwitchingSeries::parse("1.0 0.5 17\n", origin(), Direction::Forward, 1).unwrap();
        assert_eq!(s.samples()[0].lambda, 0.5);
    }

    #[test]
    fn incomplete_last_line_is_truncated() {
        let err = SwitchingSeries::parse("1.0 1.0\n0.5 0.", origin(), Direction::Forward, 1).unwrap_err();
        assert!(matches!(err, SwitchingError::Truncated { .. }));
        assert_eq!(err.kind(), ti_core::ErrorKind::BackendExecution);
    }

    #[test]
    fn header_only_or_empty_file_is_truncated() {
        for text in ["", "# Fix print output for fix f5\n", "\n\n"] {
            let err = SwitchingSeries::parse(text, origin(), Direction::Forward, 1).unwrap_err();
            assert!(matches!(err, SwitchingError::Truncated { .. }), "{text:?}: {err:?}");
            assert_eq!(err.kind(), ti_core::ErrorKind::BackendExecution);
        }
    }

    #[test]
    fn garbage_reports_line_number() {
        let err = SwitchingSeries::parse("1.0 1.0\nnan? 0.5\n", origin(), Direction::Forward, 1)
            .unwrap_err();
        match err {
            SwitchingError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
        let err = SwitchingSeries::parse("1.0\n", origin(), Direction::Forward, 1).unwrap_err();
        assert!(matches!(err, SwitchingError::Parse { line: 1, .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let path = std::env::temp_dir().join("ti_switching_definitely_missing_series.dat");
        let err = SwitchingSeries::read(&path, Direction::Backward, 1).unwrap_err();
        assert!(matches!(err, SwitchingError::MissingFile { .. }));
        assert_eq!(err.kind(), ti_core::ErrorKind::BackendExecution);
    }

    #[test]
    fn write_then_read() {
        let dir = std::env::temp_dir().join(format!("ti_switching_series_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = SwitchingSeries::path_in(&dir, SeriesFamily::Switching, Direction::Backward, 2);
        let series = SwitchingSeries::new(
            Direction::Backward,
            2,
            vec![SwitchingSample::new(0.125, 0.0), SwitchingSample::new(-2.5, 1.0)],
        );
        series.write(&path).unwrap();
        let back = SwitchingSeries::read(&path, Direction::Backward, 2).unwrap();
        assert_eq!(back, series);
        std::fs::remove_dir_all(&dir).ok();
    }
}
