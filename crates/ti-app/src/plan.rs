//! Resolve a job file into self-contained job plans.
//!
//! Everything a job needs is decided here, before any engine starts: the
//! thermodynamic state, the box, the reference model, the switching
//! protocols and the seed. Jobs only read their plan.

use crate::error::{AppError, AppResult};
use crate::seeds::SeedStream;
use std::path::Path;
use std::time::Duration;
use ti_backend::{PotentialSpec, SessionSettings, WaitOptions};
use ti_core::{LatticeKind, Phase, StructureSpec, ThermodynamicState};
use ti_project::schema::{JobFile, MdDef, QuadratureDef, ReferenceDef};
use ti_project::prepare_lattice;
use ti_reference::ReferenceModel;
use ti_results::compute_job_id;
use ti_switching::{QuadratureRule, SwitchingProtocol};

#[derive(Debug, Clone)]
pub struct JobPlan {
    pub job_id: String,
    pub label: String,
    pub phase: Phase,
    pub state: ThermodynamicState,
    pub structure: StructureSpec,
    /// Lattice name written into the report.
    pub lattice_name: String,
    /// Target potential without any reference coupling.
    pub potential: PotentialSpec,
    /// Concentration-weighted atomic mass [amu].
    pub mass: f64,
    pub reference: ReferenceModel,
    pub session: SessionSettings,
    pub md: MdDef,
    pub protocol: SwitchingProtocol,
    /// Reversible-scaling sweep up to `temperature_stop`, if requested.
    pub sweep: Option<SwitchingProtocol>,
    pub melt_threshold: f64,
    pub quadrature: QuadratureRule,
    pub wait: WaitOptions,
    pub seed: u64,
}

impl JobPlan {
    pub fn natoms(&self) -> usize {
        self.structure.natoms()
    }

    pub fn ntypes(&self) -> usize {
        self.potential.masses.len()
    }

    pub fn temperature_stop(&self) -> Option<f64> {
        self.sweep
            .as_ref()
            .map(|p| self.state.temperature() / p.lambda_end())
    }
}

/// Plan every calculation of `job`; relative paths resolve against `base_dir`.
pub fn plan_jobs(job: &JobFile, base_dir: &Path) -> AppResult<Vec<JobPlan>> {
    (0..job.calculations.len())
        .map(|i| plan_job(job, i, base_dir))
        .collect()
}

pub fn plan_job(job: &JobFile, index: usize, base_dir: &Path) -> AppResult<JobPlan> {
    ti_project::validate_job_file(job).map_err(ti_project::ProjectError::from)?;
    let calc = job.calculations.get(index).ok_or_else(|| {
        AppError::InvalidInput(format!("no calculation with index {index}"))
    })?;

    let lattice = prepare_lattice(&job.element, &calc.lattice, calc.lattice_constant, base_dir)?;
    if calc.phase == Phase::Solid && matches!(lattice.kind, LatticeKind::Liquid { .. }) {
        return Err(AppError::InvalidInput(format!(
            "calculation {index}: a solid cannot start from lattice {}",
            calc.lattice
        )));
    }
    let structure = lattice.structure(calc.replication)?;

    let concentration = lattice.concentration.clone();
    if concentration.len() > job.mass.len() {
        return Err(AppError::InvalidInput(format!(
            "calculation {index}: data file has {} atom types but {} masses are given",
            concentration.len(),
            job.mass.len()
        )));
    }
    let mass = concentration
        .iter()
        .zip(&job.mass)
        .map(|(x, m)| x * m)
        .sum::<f64>();

    let mut state = ThermodynamicState::new(calc.temperature, calc.pressure, concentration)?;
    if calc.phase == Phase::Liquid {
        state = state.with_melt_temperature(calc.melt_temperature())?;
    }

    let reference = match calc.reference_or_default() {
        ReferenceDef::UhlenbeckFord { p, sigma } => ReferenceModel::UhlenbeckFord { p, sigma },
        ReferenceDef::EinsteinCrystal => ReferenceModel::EinsteinCrystal,
    };

    let md = job.md.clone();
    let nsims = job.main.nsims;
    let protocol = SwitchingProtocol::new(md.te, md.ts, md.stride, nsims)?;
    let sweep = calc
        .temperature_stop
        .map(|t_stop| {
            SwitchingProtocol::reversible_scaling(
                md.te,
                md.ts,
                md.stride,
                nsims,
                calc.temperature,
                t_stop,
            )
        })
        .transpose()?;

    let job_id = compute_job_id(&job.element, calc, &md, job.main.seed);
    let wait = WaitOptions {
        patience: Duration::from_secs_f64(job.backend.file_patience),
        ..WaitOptions::default()
    };

    Ok(JobPlan {
        job_id,
        label: calc.slug(),
        phase: calc.phase,
        state,
        structure,
        lattice_name: lattice.report_name(),
        potential: PotentialSpec::new(&md.pair_style, &md.pair_coeff, job.mass.clone()),
        mass,
        reference,
        session: SessionSettings {
            timestep: md.timestep,
            ..SessionSettings::default()
        },
        md,
        protocol,
        sweep,
        melt_threshold: job.main.melt_threshold,
        quadrature: match job.main.quadrature {
            QuadratureDef::Trapezoid => QuadratureRule::Trapezoid,
            QuadratureDef::Simpson => QuadratureRule::Simpson,
        },
        wait,
        seed: SeedStream::job_seed(job.main.seed, index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ti_project::schema::{BackendDef, CalculationDef, MainDef};

    fn job() -> JobFile {
        let mut liquid = CalculationDef::new(Phase::Liquid, "LQD", 1400.0);
        liquid.temperature_stop = Some(2000.0);
        JobFile {
            version: 1,
            element: vec!["Cu".to_string()],
            mass: vec![63.546],
            calculations: vec![liquid, CalculationDef::new(Phase::Solid, "FCC", 500.0)],
            md: MdDef::new("eam/alloy", "* * Cu01.eam.alloy Cu"),
            backend: BackendDef::default(),
            main: MainDef::default(),
        }
    }

    #[test]
    fn liquid_plan() {
        let plans = plan_jobs(&job(), Path::new(".")).unwrap();
        let p = &plans[0];
        assert_eq!(p.phase, Phase::Liquid);
        assert_eq!(p.natoms(), 500);
        assert_eq!(p.state.temperature_high(), Some(2800.0));
        assert_eq!(p.lattice_name, "fcc");
        assert_eq!(p.mass, 63.546);
        assert!(matches!(p.reference, ReferenceModel::UhlenbeckFord { .. }));
        assert!((p.temperature_stop().unwrap() - 2000.0).abs() < 1e-9);
        assert_eq!(p.protocol.nsims, 5);
    }

    #[test]
    fn solid_plan_uses_einstein_and_own_seed() {
        let plans = plan_jobs(&job(), Path::new(".")).unwrap();
        assert_eq!(plans[1].reference, ReferenceModel::EinsteinCrystal);
        assert!(plans[1].sweep.is_none());
        assert!(plans[1].state.temperature_high().is_none());
        assert_ne!(plans[0].seed, plans[1].seed);
        assert_ne!(plans[0].job_id, plans[1].job_id);
    }

    #[test]
    fn solid_from_liquid_lattice_is_rejected() {
        let mut j = job();
        j.calculations[1].lattice = "LQD".to_string();
        let err = plan_job(&j, 1, Path::new(".")).unwrap_err();
        assert_eq!(err.kind(), ti_core::ErrorKind::InvalidParameter);
    }

    #[test]
    fn unsupported_lattice_kind() {
        let mut j = job();
        j.calculations[1].lattice = "A15".to_string();
        let err = plan_job(&j, 1, Path::new(".")).unwrap_err();
        assert_eq!(err.kind(), ti_core::ErrorKind::UnsupportedLattice);
    }
}
