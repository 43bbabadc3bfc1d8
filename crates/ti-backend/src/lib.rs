//! ti-backend: the MD engine and structure analysis behind a capability trait.
//!
//! Provides:
//! - `SimulationBackend`, the command surface the job state machine drives
//! - `LammpsBackend`, a LAMMPS process fed through stdin
//! - `ReplayBackend`, a deterministic stand-in that writes canned outputs
//! - `Snapshot`, LAMMPS dump files held in memory
//! - `SteinhardtClassifier`, a q6 bond-order solid/liquid classifier
//! - file waiting for outputs the engine is still writing

pub mod classify;
pub mod commands;
pub mod error;
pub mod lammps;
pub mod output;
pub mod replay;
pub mod snapshot;
pub mod traits;
pub mod wait;

pub use classify::SteinhardtClassifier;
pub use commands::{EnsembleFix, PotentialSpec, ReferenceCoupling, SessionSettings};
pub use error::{BackendError, BackendResult};
pub use lammps::{LammpsBackend, LammpsLauncher};
pub use output::{AverageRow, AverageSeries};
pub use replay::{BackendCall, CallLog, ReplayBackend, ReplayScript};
pub use snapshot::{AtomRecord, Snapshot};
pub use traits::{PhaseClassifier, SimulationBackend};
pub use wait::{WaitOptions, wait_for_file};
