//! Engine-neutral description of what a stage asks the backend to do.
//!
//! λ is always the weight of the system of interest: at λ = 1 the target
//! potential acts alone, at λ = 0 only the reference does.

use std::path::PathBuf;

/// Settings applied once per session (and again after `reset`).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// MD timestep [ps].
    pub timestep: f64,
    /// Thermo output interval in steps; 0 disables it.
    pub thermo_every: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timestep: 0.001,
            thermo_every: 1000,
        }
    }
}

/// Reference system coupled to the target potential during switching.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceCoupling {
    /// Uhlenbeck–Ford pair potential overlaid on the target.
    UhlenbeckFord {
        /// [eV]
        epsilon: f64,
        /// [Å]
        sigma: f64,
        /// [Å]
        cutoff: f64,
    },
    /// Harmonic springs tethering each atom to where it sits when the potential is set.
    EinsteinSprings {
        /// [eV/Å²]
        spring_constant: f64,
    },
    /// No reference: λ scales the target potential itself.
    PotentialScaling,
}

impl ReferenceCoupling {
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceCoupling::UhlenbeckFord { .. } => "uhlenbeck-ford",
            ReferenceCoupling::EinsteinSprings { .. } => "einstein",
            ReferenceCoupling::PotentialScaling => "scaling",
        }
    }
}

/// Interatomic potential of the system of interest plus its optional coupling.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialSpec {
    pub pair_style: String,
    /// Full `pair_coeff` argument string, e.g. `* * Cu01.eam.alloy Cu`.
    pub pair_coeff: String,
    /// One mass per atom type [amu].
    pub masses: Vec<f64>,
    pub reference: Option<ReferenceCoupling>,
}

impl PotentialSpec {
    pub fn new(pair_style: impl Into<String>, pair_coeff: impl Into<String>, masses: Vec<f64>) -> Self {
        Self {
            pair_style: pair_style.into(),
            pair_coeff: pair_coeff.into(),
            masses,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: ReferenceCoupling) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Style keyword without its arguments, e.g. `eam/fs` from `eam/fs extra`.
    pub fn style_name(&self) -> &str {
        self.pair_style.split_whitespace().next().unwrap_or("")
    }
}

/// One ingredient of a dynamics run. Fixes live for exactly one `run_dynamics` call.
#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleFix {
    /// Draw velocities from a Maxwell–Boltzmann distribution.
    Velocity { temperature: f64, seed: u64 },
    /// Nosé–Hoover thermostat and isotropic barostat.
    Npt {
        temperature: f64,
        pressure: f64,
        tdamp: f64,
        pdamp: f64,
    },
    /// Barostat only; pair with `Langevin`. Anisotropic when `aniso`.
    Nph {
        pressure: f64,
        pdamp: f64,
        aniso: bool,
    },
    Nve,
    Langevin {
        temperature: f64,
        tdamp: f64,
        seed: u64,
        zero_momentum: bool,
    },
    /// Print `step press vol temp [msd]` every `every` steps to `path`.
    AverageOutput {
        path: PathBuf,
        every: u64,
        msd: bool,
    },
    /// Coupling held at a fixed λ for the run.
    Hold { lambda: f64 },
    /// Linear λ ramp over the run; `<dU> <λ>` appended to `output` every `stride` steps.
    Switch {
        from: f64,
        to: f64,
        output: PathBuf,
        stride: u64,
    },
}

impl EnsembleFix {
    pub fn label(&self) -> &'static str {
        match self {
            EnsembleFix::Velocity { .. } => "velocity",
            EnsembleFix::Npt { .. } => "npt",
            EnsembleFix::Nph { .. } => "nph",
            EnsembleFix::Nve => "nve",
            EnsembleFix::Langevin { .. } => "langevin",
            EnsembleFix::AverageOutput { .. } => "average",
            EnsembleFix::Hold { .. } => "hold",
            EnsembleFix::Switch { .. } => "switch",
        }
    }
}
