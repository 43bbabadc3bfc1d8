//! Capability traits for the engine and the structure analysis.

use crate::commands::{EnsembleFix, PotentialSpec, SessionSettings};
use crate::error::BackendResult;
use crate::output::AverageSeries;
use crate::snapshot::Snapshot;
use crate::wait::{WaitOptions, wait_for_file};
use std::path::{Path, PathBuf};
use ti_core::{CancelToken, StructureSpec};
use ti_switching::{Direction, SwitchingSeries};

/// A command-driven MD engine owned by exactly one job.
///
/// Relative paths are resolved against `working_dir`. Methods block until
/// the engine has finished the request.
pub trait SimulationBackend: Send {
    fn name(&self) -> &str;

    fn working_dir(&self) -> &Path;

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir().join(path)
        }
    }

    /// Units, boundaries and timestep.
    fn configure(&mut self, settings: &SessionSettings) -> BackendResult<()>;

    /// Create the periodic box and its atoms; returns the atom count.
    fn build_box(&mut self, structure: &StructureSpec, ntypes: usize) -> BackendResult<usize>;

    fn set_potential(&mut self, potential: &PotentialSpec) -> BackendResult<()>;

    /// Run `steps` steps with `fixes` active, then remove them.
    fn run_dynamics(&mut self, steps: u64, fixes: &[EnsembleFix]) -> BackendResult<()>;

    /// Write the current configuration (positions and velocities) to `path`.
    fn dump_snapshot(&mut self, path: &Path) -> BackendResult<()>;

    /// Replace positions and velocities of the current box with a snapshot.
    fn load_snapshot(&mut self, path: &Path) -> BackendResult<()>;

    /// Drop the current box and potential; settings must be applied again.
    fn reset(&mut self) -> BackendResult<()>;

    /// Shut the engine down. Further calls fail.
    fn close(&mut self) -> BackendResult<()>;

    fn read_snapshot(&mut self, path: &Path) -> BackendResult<Snapshot> {
        Snapshot::read(&self.resolve(path))
    }

    /// Parse a `<dU> <λ>` file once it is complete.
    fn read_scalar_series(
        &mut self,
        path: &Path,
        direction: Direction,
        replicate: usize,
        wait: &WaitOptions,
        cancel: &CancelToken,
    ) -> BackendResult<SwitchingSeries> {
        let path = self.resolve(path);
        wait_for_file(&path, wait, cancel)?;
        Ok(SwitchingSeries::read(&path, direction, replicate)?)
    }

    fn read_average_series(
        &mut self,
        path: &Path,
        wait: &WaitOptions,
        cancel: &CancelToken,
    ) -> BackendResult<AverageSeries> {
        let path = self.resolve(path);
        wait_for_file(&path, wait, cancel)?;
        AverageSeries::read(&path)
    }
}

/// Solid/liquid classification of a configuration.
pub trait PhaseClassifier: Send + Sync {
    /// Fraction of atoms in the largest solid-like cluster, in `[0, 1]`.
    fn classify_phase_fraction(&self, snapshot: &Snapshot) -> BackendResult<f64>;
}
