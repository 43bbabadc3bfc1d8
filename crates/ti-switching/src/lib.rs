//! ti-switching: switching protocols, work-density series and their integration.
//!
//! The MD engine records `(dU, λ)` while the coupling parameter is ramped
//! between the system of interest and the reference. This crate describes
//! those ramps, reads the recorded series once into memory, and turns
//! forward/backward pairs into a hysteresis-corrected work estimate.

pub mod error;
pub mod integrator;
pub mod protocol;
pub mod scaling;
pub mod series;

pub use error::{SwitchingError, SwitchingResult};
pub use integrator::{
    IntegratorOptions, Quadrature, QuadratureRule, ReplicateWork, Simpson, Trapezoid,
    WorkEstimate, integrate_work, integrate_work_with,
};
pub use protocol::{LambdaPath, Leg, SwitchingProtocol};
pub use scaling::{SweepPoint, TemperatureSweep, integrate_reversible_scaling};
pub use series::{Direction, SeriesFamily, SwitchingSample, SwitchingSeries, series_file_name};
