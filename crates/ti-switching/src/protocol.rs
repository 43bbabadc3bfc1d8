//! The staged λ ramp: equilibrate at fixed coupling, ramp, equilibrate, ramp back.

use crate::error::{SwitchingError, SwitchingResult};
use crate::series::{Direction, SeriesFamily, series_file_name};

/// Orientation of the forward leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LambdaPath {
    /// Forward leg 1 → 0, backward leg 0 → 1.
    #[default]
    Descending,
    /// Forward leg 0 → 1, backward leg 1 → 0.
    Ascending,
}

/// One ramp: `from` → `to` over `steps` steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub direction: Direction,
    pub from: f64,
    pub to: f64,
    pub steps: u64,
}

impl Leg {
    /// λ after `step` steps of the ramp, clamped to the leg.
    pub fn lambda_at(&self, step: u64) -> f64 {
        let s = step.min(self.steps) as f64 / self.steps as f64;
        self.from + (self.to - self.from) * s
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchingProtocol {
    /// Equilibration steps before each leg.
    pub te: u64,
    /// Switching steps per leg.
    pub ts: u64,
    /// Record every `stride` steps.
    pub stride: u64,
    /// Independent replicates.
    pub nsims: usize,
    pub family: SeriesFamily,
    lambda_start: f64,
    lambda_end: f64,
}

impl SwitchingProtocol {
    /// Coupling protocol between the system of interest and the reference.
    pub fn new(te: u64, ts: u64, stride: u64, nsims: usize) -> SwitchingResult<Self> {
        Self::validate(ts, stride, nsims)?;
        Ok(Self {
            te,
            ts,
            stride,
            nsims,
            family: SeriesFamily::Switching,
            lambda_start: 1.0,
            lambda_end: 0.0,
        })
    }

    /// Potential-energy scaling from `t0` to `t_stop`: λ runs 1 → t0/t_stop.
    pub fn reversible_scaling(
        te: u64,
        ts: u64,
        stride: u64,
        nsims: usize,
        t0: f64,
        t_stop: f64,
    ) -> SwitchingResult<Self> {
        Self::validate(ts, stride, nsims)?;
        if !(t0.is_finite() && t0 > 0.0 && t_stop.is_finite() && t_stop > 0.0) {
            return Err(SwitchingError::InvalidProtocol {
                what: "sweep temperatures must be positive",
            });
        }
        if t_stop == t0 {
            return Err(SwitchingError::InvalidProtocol {
                what: "sweep end temperature equals start temperature",
            });
        }
        Ok(Self {
            te,
            ts,
            stride,
            nsims,
            family: SeriesFamily::ReversibleScaling,
            lambda_start: 1.0,
            lambda_end: t0 / t_stop,
        })
    }

    fn validate(ts: u64, stride: u64, nsims: usize) -> SwitchingResult<()> {
        if ts == 0 {
            return Err(SwitchingError::InvalidProtocol {
                what: "switching steps must be positive",
            });
        }
        if stride == 0 || stride > ts {
            return Err(SwitchingError::InvalidProtocol {
                what: "stride must be between 1 and the switching steps",
            });
        }
        // the last λ sample lands on step ts only when stride divides it
        if ts % stride != 0 {
            return Err(SwitchingError::InvalidProtocol {
                what: "stride must divide the switching steps",
            });
        }
        if nsims == 0 {
            return Err(SwitchingError::InvalidProtocol {
                what: "at least one replicate is required",
            });
        }
        Ok(())
    }

    /// Flip the orientation of a coupling protocol.
    pub fn with_path(mut self, path: LambdaPath) -> Self {
        let (hi, lo) = (
            self.lambda_start.max(self.lambda_end),
            self.lambda_start.min(self.lambda_end),
        );
        (self.lambda_start, self.lambda_end) = match path {
            LambdaPath::Descending => (hi, lo),
            LambdaPath::Ascending => (lo, hi),
        };
        self
    }

    pub fn lambda_start(&self) -> f64 {
        self.lambda_start
    }

    pub fn lambda_end(&self) -> f64 {
        self.lambda_end
    }

    pub fn forward(&self) -> Leg {
        Leg {
            direction: Direction::Forward,
            from: self.lambda_start,
            to: self.lambda_end,
            steps: self.ts,
        }
    }

    pub fn backward(&self) -> Leg {
        Leg {
            direction: Direction::Backward,
            from: self.lambda_end,
            to: self.lambda_start,
            steps: self.ts,
        }
    }

    /// Forward leg first; the backward leg continues from its end state.
    pub fn legs(&self) -> [Leg; 2] {
        [self.forward(), self.backward()]
    }

    /// Samples per leg: the endpoint plus one per stride.
    pub fn expected_samples(&self) -> usize {
        (self.ts / self.stride) as usize + 1
    }

    pub fn replicates(&self) -> impl Iterator<Item = usize> {
        1..=self.nsims
    }

    pub fn file_name(&self, direction: Direction, replicate: usize) -> String {
        series_file_name(self.family, direction, replicate)
    }

    /// Total MD steps of one replicate.
    pub fn steps_per_replicate(&self) -> u64 {
        2 * (self.te + self.ts)
    }
}
