//! Deterministic stand-in for the MD engine.
//!
//! Writes the files a real session would leave behind (`avg.dat`, switching
//! series, dumps) from a small script of canned values, and records every
//! call so tests can check what a job asked for.

use crate::commands::{EnsembleFix, PotentialSpec, SessionSettings};
use crate::error::{BackendError, BackendResult};
use crate::snapshot::Snapshot;
use crate::traits::SimulationBackend;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use ti_core::StructureSpec;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Configure,
    BuildBox { natoms: usize },
    SetPotential { reference: Option<&'static str> },
    Run { steps: u64, fixes: Vec<&'static str> },
    Dump { path: PathBuf },
    Load { path: PathBuf },
    Reset,
    Close,
}

/// Shared record of calls; survives the backend being moved into a job.
pub type CallLog = Arc<Mutex<Vec<BackendCall>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayScript {
    /// Volume per atom written to averages [Å³].
    pub volume_per_atom: f64,
    /// [bar]
    pub pressure: f64,
    /// Mean squared displacement written when sampled [Å²].
    pub msd: f64,
    /// Work density `dU(λ) = work_intercept + work_slope λ` [eV/atom].
    pub work_intercept: f64,
    pub work_slope: f64,
    /// Irreversible work added to every switching leg [eV/atom].
    pub dissipation: f64,
    /// Dumps are random (liquid-like) instead of the ideal crystal.
    pub melted: bool,
    pub seed: u64,
    /// File names never written, to simulate a failing engine.
    pub omit_outputs: Vec<String>,
    /// `run_dynamics` call (1-based) that fails.
    pub fail_on_run: Option<usize>,
}

impl Default for ReplayScript {
    fn default() -> Self {
        Self {
            volume_per_atom: 12.5,
            pressure: 0.0,
            msd: 0.015,
            work_intercept: -3.6,
            work_slope: 0.8,
            dissipation: 0.002,
            melted: true,
            seed: 0,
            omit_outputs: Vec::new(),
            fail_on_run: None,
        }
    }
}

impl ReplayScript {
    /// Exact reversible work of one forward leg 1 → 0.
    pub fn reversible_work(&self) -> f64 {
        -(self.work_intercept + 0.5 * self.work_slope)
    }
}

pub struct ReplayBackend {
    dir: PathBuf,
    script: ReplayScript,
    log: CallLog,
    structure: Option<StructureSpec>,
    natoms: usize,
    runs: usize,
    closed: bool,
}

impl ReplayBackend {
    pub fn new(dir: impl Into<PathBuf>, script: ReplayScript) -> BackendResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| BackendError::io(&dir, e))?;
        Ok(Self {
            dir,
            script,
            log: CallLog::default(),
            structure: None,
            natoms: 0,
            runs: 0,
            closed: false,
        })
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn record(&mut self, call: BackendCall) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::State {
                what: "engine already closed",
            });
        }
        debug!(?call, "replay");
        if let Ok(mut log) = self.log.lock() {
            log.push(call);
        }
        Ok(())
    }

    fn omitted(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.script.omit_outputs.iter().any(|o| o == n))
    }

    fn write(&self, path: &Path, text: &str) -> BackendResult<()> {
        let path = self.resolve(path);
        if self.omitted(&path) {
            debug!(path = %path.display(), "replay omits output");
            return Ok(());
        }
        std::fs::write(&path, text).map_err(|e| BackendError::io(&path, e))
    }

    fn averages(&self, steps: u64, every: u64, msd: bool, temperature: f64) -> String {
        let volume = self.natoms as f64 * self.script.volume_per_atom;
        let mut out = String::new();
        let every = every.max(1);
        let mut step = every;
        while step <= steps {
            let _ = write!(out, "{step} {} {volume} {temperature}", self.script.pressure);
            if msd {
                let _ = write!(out, " {}", self.script.msd);
            }
            out.push('\n');
            step += every;
        }
        out
    }

    fn switching(&self, steps: u64, from: f64, to: f64, stride: u64) -> String {
        let s = &self.script;
        let extra = s.dissipation / (to - from);
        let mut out = String::from("# Fix print output for fix replay\n");
        let stride = stride.max(1);
        let mut step = 0;
        while step <= steps {
            let lambda = from + (to - from) * step as f64 / steps.max(1) as f64;
            let du = s.work_intercept + s.work_slope * lambda + extra;
            let _ = writeln!(out, "{du} {lambda}");
            step += stride;
        }
        out
    }
}

impl SimulationBackend for ReplayBackend {
    fn name(&self) -> &str {
        "replay"
    }

    fn working_dir(&self) -> &Path {
        &self.dir
    }

    fn configure(&mut self, _settings: &SessionSettings) -> BackendResult<()> {
        self.record(BackendCall::Configure)
    }

    fn build_box(&mut self, structure: &StructureSpec, _ntypes: usize) -> BackendResult<usize> {
        self.natoms = structure.natoms();
        self.structure = Some(structure.clone());
        self.record(BackendCall::BuildBox {
            natoms: self.natoms,
        })?;
        Ok(self.natoms)
    }

    fn set_potential(&mut self, potential: &PotentialSpec) -> BackendResult<()> {
        self.record(BackendCall::SetPotential {
            reference: potential.reference.as_ref().map(|r| r.label()),
        })
    }

    fn run_dynamics(&mut self, steps: u64, fixes: &[EnsembleFix]) -> BackendResult<()> {
        self.record(BackendCall::Run {
            steps,
            fixes: fixes.iter().map(EnsembleFix::label).collect(),
        })?;
        self.runs += 1;
        if self.script.fail_on_run == Some(self.runs) {
            return Err(BackendError::CommandFailed {
                command: format!("run {steps}"),
                message: "ERROR: replay script failure".to_string(),
            });
        }
        let temperature = fixes
            .iter()
            .find_map(|f| match f {
                EnsembleFix::Npt { temperature, .. } | EnsembleFix::Langevin { temperature, .. } => {
                    Some(*temperature)
                }
                _ => None,
            })
            .unwrap_or(0.0);
        for fix in fixes {
            match fix {
                EnsembleFix::AverageOutput { path, every, msd } => {
                    let text = self.averages(steps, *every, *msd, temperature);
                    self.write(path, &text)?;
                }
                EnsembleFix::Switch {
                    from,
                    to,
                    output,
                    stride,
                } => {
                    let text = self.switching(steps, *from, *to, *stride);
                    self.write(output, &text)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn dump_snapshot(&mut self, path: &Path) -> BackendResult<()> {
        self.record(BackendCall::Dump {
            path: path.to_path_buf(),
        })?;
        let structure = self.structure.as_ref().ok_or(BackendError::State {
            what: "dump before the box was built",
        })?;
        let crystal = structure.lattice().build_crystal();
        let snapshot = match crystal {
            Some(c) if !self.script.melted => {
                Snapshot::crystal(c, structure.lattice_constant(), structure.replication())
            }
            _ => Snapshot::disordered(
                self.natoms,
                1.0 / self.script.volume_per_atom,
                self.script.seed,
            ),
        };
        self.write(path, &snapshot.to_dump_string())
    }

    fn load_snapshot(&mut self, path: &Path) -> BackendResult<()> {
        self.record(BackendCall::Load {
            path: path.to_path_buf(),
        })?;
        let snapshot = Snapshot::read(&self.resolve(path))?;
        self.natoms = snapshot.natoms();
        Ok(())
    }

    fn reset(&mut self) -> BackendResult<()> {
        self.record(BackendCall::Reset)?;
        self.structure = None;
        self.natoms = 0;
        Ok(())
    }

    fn close(&mut self) -> BackendResult<()> {
        if self.closed {
            return Ok(());
        }
        self.record(BackendCall::Close)?;
        self.closed = true;
        Ok(())
    }
}
