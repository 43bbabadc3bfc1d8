//! Job file schema definitions.

use serde::{Deserialize, Serialize};
use ti_core::Phase;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobFile {
    pub version: u32,
    /// Chemical symbols, one per atom type.
    pub element: Vec<String>,
    /// Atomic masses [amu], one per atom type.
    pub mass: Vec<f64>,
    #[serde(default)]
    pub calculations: Vec<CalculationDef>,
    pub md: MdDef,
    #[serde(default)]
    pub backend: BackendDef,
    #[serde(default)]
    pub main: MainDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalculationDef {
    pub phase: Phase,
    /// `BCC`, `FCC`, `HCP`, `DIA`, `SC`, `LQD` or a LAMMPS data file.
    pub lattice: String,
    /// [K]
    pub temperature: f64,
    /// [bar]
    #[serde(default)]
    pub pressure: f64,
    /// Melt temperature for liquids [K]; twice the target when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_high: Option<f64>,
    /// End of a reversible-scaling sweep [K].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_stop: Option<f64>,
    #[serde(default = "default_replication")]
    pub replication: [u32; 3],
    /// Overrides the lattice constant from the element table [Å].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lattice_constant: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceDef>,
}

impl CalculationDef {
    pub fn new(phase: Phase, lattice: impl Into<String>, temperature: f64) -> Self {
        Self {
            phase,
            lattice: lattice.into(),
            temperature,
            pressure: 0.0,
            temperature_high: None,
            temperature_stop: None,
            replication: default_replication(),
            lattice_constant: None,
            reference: None,
        }
    }

    pub fn melt_temperature(&self) -> f64 {
        self.temperature_high.unwrap_or(2.0 * self.temperature)
    }

    /// Reference model for this calculation: the override, else the phase default.
    pub fn reference_or_default(&self) -> ReferenceDef {
        self.reference.clone().unwrap_or(match self.phase {
            Phase::Liquid => ReferenceDef::UhlenbeckFord {
                p: default_ufm_p(),
                sigma: default_ufm_sigma(),
            },
            Phase::Solid => ReferenceDef::EinsteinCrystal,
        })
    }

    /// Short description used in logs and directory names.
    pub fn slug(&self) -> String {
        let lattice = std::path::Path::new(&self.lattice)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.lattice);
        format!(
            "{}-{}-{}K-{}bar",
            self.phase.label(),
            lattice.to_ascii_lowercase(),
            self.temperature,
            self.pressure
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ReferenceDef {
    UhlenbeckFord {
        #[serde(default = "default_ufm_p")]
        p: f64,
        #[serde(default = "default_ufm_sigma")]
        sigma: f64,
    },
    EinsteinCrystal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MdDef {
    pub pair_style: String,
    pub pair_coeff: String,
    /// [ps]
    #[serde(default = "default_timestep")]
    pub timestep: f64,
    /// Thermostat damping [ps].
    #[serde(default = "default_tdamp")]
    pub tdamp: f64,
    /// Barostat damping [ps].
    #[serde(default = "default_pdamp")]
    pub pdamp: f64,
    /// Equilibration steps at fixed λ before each switching leg.
    #[serde(default = "default_te")]
    pub te: u64,
    /// Switching steps per leg.
    #[serde(default = "default_ts")]
    pub ts: u64,
    /// Steps for melting and for reaching the target state.
    #[serde(default = "default_nsmall")]
    pub nsmall: u64,
    /// Averaging steps at the target state.
    #[serde(default = "default_nlarge")]
    pub nlarge: u64,
    /// Steps between recorded switching samples.
    #[serde(default = "default_stride")]
    pub stride: u64,
    /// Trailing `avg.dat` rows used for the mean volume.
    #[serde(default = "default_averaging_window")]
    pub averaging_window: usize,
}

impl MdDef {
    pub fn new(pair_style: impl Into<String>, pair_coeff: impl Into<String>) -> Self {
        Self {
            pair_style: pair_style.into(),
            pair_coeff: pair_coeff.into(),
            timestep: default_timestep(),
            tdamp: default_tdamp(),
            pdamp: default_pdamp(),
            te: default_te(),
            ts: default_ts(),
            nsmall: default_nsmall(),
            nlarge: default_nlarge(),
            stride: default_stride(),
            averaging_window: default_averaging_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendDef {
    #[serde(default = "default_executable")]
    pub executable: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default = "default_cores")]
    pub cores: usize,
    /// Parent of every job directory.
    #[serde(default = "default_working_root")]
    pub working_root: String,
    /// Seconds to wait for an output file to be complete.
    #[serde(default = "default_file_patience")]
    pub file_patience: f64,
}

impl Default for BackendDef {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            arguments: Vec::new(),
            cores: default_cores(),
            working_root: default_working_root(),
            file_patience: default_file_patience(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MainDef {
    #[serde(default = "default_nsims")]
    pub nsims: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Solid fraction above which a melt is rejected.
    #[serde(default = "default_melt_threshold")]
    pub melt_threshold: f64,
    #[serde(default)]
    pub quadrature: QuadratureDef,
    /// Jobs run at the same time; 0 lets the thread pool decide.
    #[serde(default)]
    pub parallel_jobs: usize,
}

impl Default for MainDef {
    fn default() -> Self {
        Self {
            nsims: default_nsims(),
            seed: default_seed(),
            melt_threshold: default_melt_threshold(),
            quadrature: QuadratureDef::default(),
            parallel_jobs: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuadratureDef {
    #[default]
    Trapezoid,
    Simpson,
}

fn default_replication() -> [u32; 3] {
    [5, 5, 5]
}

fn default_ufm_p() -> f64 {
    50.0
}

fn default_ufm_sigma() -> f64 {
    1.5
}

fn default_timestep() -> f64 {
    0.001
}

fn default_tdamp() -> f64 {
    0.1
}

fn default_pdamp() -> f64 {
    0.1
}

fn default_te() -> u64 {
    25_000
}

fn default_ts() -> u64 {
    50_000
}

fn default_nsmall() -> u64 {
    25_000
}

fn default_nlarge() -> u64 {
    50_000
}

fn default_stride() -> u64 {
    1
}

fn default_averaging_window() -> usize {
    100
}

fn default_executable() -> String {
    "lmp_serial".to_string()
}

fn default_cores() -> usize {
    1
}

fn default_working_root() -> String {
    "ti-runs".to_string()
}

fn default_file_patience() -> f64 {
    5.0
}

fn default_nsims() -> usize {
    5
}

fn default_seed() -> u64 {
    20_211_985
}

fn default_melt_threshold() -> f64 {
    0.5
}
