//! Result data types.

use serde::{Deserialize, Serialize};
use ti_core::{ErrorKind, Phase};

pub type JobId = String;

/// Final record of a job, written once as `report.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeEnergyReport {
    /// [K]
    pub temperature: f64,
    /// [bar]
    pub pressure: f64,
    /// Lattice the box was built from (`fcc`, `diamond`, `file`).
    pub lattice: String,
    /// Solute mole fraction.
    pub concentration: f64,
    /// Number density at the target state [1/Å³].
    pub rho: f64,
    /// Free energy per atom [eV].
    pub fe: f64,
    /// Standard error of `fe` [eV].
    pub fe_err: f64,
}

impl FreeEnergyReport {
    pub fn check(&self) -> Result<(), crate::ResultsError> {
        let finite = [
            self.temperature,
            self.pressure,
            self.concentration,
            self.rho,
            self.fe,
            self.fe_err,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(crate::ResultsError::InvalidReport {
                what: "non-finite value",
            });
        }
        if self.rho <= 0.0 {
            return Err(crate::ResultsError::InvalidReport {
                what: "density must be positive",
            });
        }
        if self.fe_err < 0.0 {
            return Err(crate::ResultsError::InvalidReport {
                what: "error must be non-negative",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobManifest {
    pub job_id: JobId,
    pub label: String,
    pub timestamp: String,
    pub phase: Phase,
    pub reference: String,
    pub seed: u64,
    #[serde(default)]
    pub stages: Vec<String>,
    pub status: JobStatus,
    /// `temperature_sweep.dat` when a sweep ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum JobStatus {
    Done,
    Failed {
        stage: String,
        kind: ErrorKind,
        message: String,
    },
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Done)
    }
}
