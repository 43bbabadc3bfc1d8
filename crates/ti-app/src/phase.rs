//! The phase state machine driving one job through its stages.
//!
//! ```text
//! INIT → BUILD_STRUCTURE → EQUILIBRATE_HIGH → MELT_CHECK → EQUILIBRATE_TARGET
//!      → PREPARE_REFERENCE → SWITCH → INTEGRATE → REPORT → [SWEEP] → DONE
//! ```
//!
//! Solids skip the melt stages. Any stage may fail, which ends the job in
//! FAILED with the stage and error kind recorded; nothing is retried. The
//! engine is closed on every exit path.

use crate::error::{AppError, AppResult, JobFailure};
use crate::plan::JobPlan;
use crate::progress::{JobProgressEvent, JobStage, ProgressSink};
use crate::seeds::SeedStream;
use std::path::{Path, PathBuf};
use std::time::Instant;
use ti_backend::{
    BackendError, EnsembleFix, PhaseClassifier, PotentialSpec, ReferenceCoupling,
    SimulationBackend,
};
use ti_core::{CancelToken, Phase};
use ti_reference::{
    ReferenceBreakdown, ReferenceModel, ReferenceState, UFM_CUTOFF, UhlenbeckFord,
    spring_constant_from_msd,
};
use ti_results::{FreeEnergyReport, JobManifest, JobStatus, ReportStore};
use ti_switching::{
    IntegratorOptions, Leg, SwitchingProtocol, SwitchingSeries, TemperatureSweep,
    WorkEstimate, integrate_reversible_scaling, integrate_work_with,
};
use tracing::{debug, info, info_span, warn};

pub const MELT_SNAPSHOT: &str = "traj.melt";
pub const AVERAGE_FILE: &str = "avg.dat";
pub const CONF_SNAPSHOT: &str = "conf.dump";
pub const SWEEP_FILE: &str = "temperature_sweep.dat";

/// Steps between rows of the averaging output.
const AVERAGE_EVERY: u64 = 10;

/// Stage following `stage` on the success path.
pub fn next_stage(stage: JobStage, phase: Phase, sweep: bool) -> JobStage {
    match stage {
        JobStage::Init => JobStage::BuildStructure,
        JobStage::BuildStructure => match phase {
            Phase::Liquid => JobStage::EquilibrateHigh,
            Phase::Solid => JobStage::EquilibrateTarget,
        },
        JobStage::EquilibrateHigh => JobStage::MeltCheck,
        JobStage::MeltCheck => JobStage::EquilibrateTarget,
        JobStage::EquilibrateTarget => JobStage::PrepareReference,
        JobStage::PrepareReference => JobStage::Switch,
        JobStage::Switch => JobStage::Integrate,
        JobStage::Integrate => JobStage::Report,
        JobStage::Report if sweep => JobStage::Sweep,
        JobStage::Report | JobStage::Sweep => JobStage::Done,
        JobStage::Done | JobStage::Failed => stage,
    }
}

/// What a successful job produced.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub report: FreeEnergyReport,
    pub report_path: PathBuf,
    pub work: WorkEstimate,
    pub reference: ReferenceBreakdown,
    /// Solid fraction found by the melt check (liquids only).
    pub solid_fraction: Option<f64>,
    pub sweep: Option<TemperatureSweep>,
}

#[derive(Default)]
struct JobContext {
    natoms: usize,
    solid_fraction: Option<f64>,
    density: Option<f64>,
    msd: Option<f64>,
    coupling: Option<ReferenceCoupling>,
    reference: Option<ReferenceBreakdown>,
    forward: Vec<SwitchingSeries>,
    backward: Vec<SwitchingSeries>,
    work: Option<WorkEstimate>,
    free_energy: Option<f64>,
    report: Option<(FreeEnergyReport, PathBuf)>,
    sweep: Option<TemperatureSweep>,
}

fn missing(what: &str) -> AppError {
    AppError::MissingOutput {
        what: what.to_string(),
    }
}

pub struct JobRunner<'a> {
    plan: &'a JobPlan,
    backend: &'a mut dyn SimulationBackend,
    classifier: &'a dyn PhaseClassifier,
    store: &'a ReportStore,
    cancel: &'a CancelToken,
    progress: Option<ProgressSink<'a>>,
    deadline: Option<Instant>,
    started: Instant,
    seeds: SeedStream,
    visited: Vec<JobStage>,
    ctx: JobContext,
}

impl<'a> JobRunner<'a> {
    pub fn new(
        plan: &'a JobPlan,
        backend: &'a mut dyn SimulationBackend,
        classifier: &'a dyn PhaseClassifier,
        store: &'a ReportStore,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            plan,
            backend,
            classifier,
            store,
            cancel,
            progress: None,
            deadline: None,
            started: Instant::now(),
            seeds: SeedStream::new(plan.seed),
            visited: Vec::new(),
            ctx: JobContext::default(),
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressSink<'a>>) -> Self {
        self.progress = progress;
        self
    }

    /// Past `deadline` the current stage is treated as cancelled.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Drive the job to DONE or FAILED. Returns the visited stages in order.
    pub fn run(mut self) -> (Vec<JobStage>, Result<JobSummary, JobFailure>) {
        let span = info_span!("job", id = %short_id(&self.plan.job_id), label = %self.plan.label);
        let _enter = span.enter();

        let mut stage = JobStage::Init;
        let outcome = loop {
            let step = match self.check_cancel() {
                Ok(()) => {
                    self.enter(stage, None);
                    self.execute(stage)
                }
                Err(e) => Err(e),
            };
            if let Err(e) = step {
                break Err(JobFailure::new(stage, &e));
            }
            stage = next_stage(stage, self.plan.phase, self.plan.sweep.is_some());
            if stage.is_terminal() {
                break Ok(());
            }
        };

        let result = match outcome {
            Ok(()) => self.finish(),
            Err(failure) => {
                self.abort(&failure);
                Err(failure)
            }
        };
        (self.visited, result)
    }

    fn enter(&mut self, stage: JobStage, message: Option<String>) {
        self.visited.push(stage);
        info!(stage = %stage, "entering stage");
        self.emit(stage, message, None);
    }

    fn emit(&self, stage: JobStage, message: Option<String>, replicate: Option<(usize, usize)>) {
        if let Some(sink) = self.progress {
            let mut event = JobProgressEvent::stage(
                &self.plan.job_id,
                stage,
                self.started.elapsed().as_secs_f64(),
                message,
            );
            event.replicate = replicate;
            sink(event);
        }
    }

    fn check_cancel(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("deadline reached");
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    fn execute(&mut self, stage: JobStage) -> AppResult<()> {
        match stage {
            JobStage::Init => self.init(),
            JobStage::BuildStructure => self.build_structure(),
            JobStage::EquilibrateHigh => self.equilibrate_high(),
            JobStage::MeltCheck => self.melt_check(),
            JobStage::EquilibrateTarget => self.equilibrate_target(),
            JobStage::PrepareReference => self.prepare_reference(),
            JobStage::Switch => self.switch(),
            JobStage::Integrate => self.integrate(),
            JobStage::Report => self.report(),
            JobStage::Sweep => self.sweep(),
            JobStage::Done | JobStage::Failed => Ok(()),
        }
    }

    fn init(&mut self) -> AppResult<()> {
        debug!(
            engine = self.backend.name(),
            dir = %self.backend.working_dir().display(),
            natoms = self.plan.natoms(),
            "starting job"
        );
        self.backend.configure(&self.plan.session)?;
        Ok(())
    }

    fn build_structure(&mut self) -> AppResult<()> {
        let natoms = self
            .backend
            .build_box(&self.plan.structure, self.plan.ntypes())?;
        if natoms != self.plan.natoms() {
            return Err(BackendError::Protocol {
                what: format!(
                    "engine created {natoms} atoms, structure has {}",
                    self.plan.natoms()
                ),
            }
            .into());
        }
        self.ctx.natoms = natoms;
        self.backend.set_potential(&self.plan.potential)?;
        Ok(())
    }

    fn npt(&self, temperature: f64) -> EnsembleFix {
        EnsembleFix::Npt {
            temperature,
            pressure: self.plan.state.pressure(),
            tdamp: self.plan.md.tdamp,
            pdamp: self.plan.md.pdamp,
        }
    }

    fn equilibrate_high(&mut self) -> AppResult<()> {
        let t_high = self.plan.state.temperature_high().ok_or_else(|| {
            AppError::InvalidInput("liquid job without a melt temperature".to_string())
        })?;
        let velocity = EnsembleFix::Velocity {
            temperature: t_high,
            seed: self.seeds.next_seed(),
        };
        let npt = self.npt(t_high);
        self.backend
            .run_dynamics(self.plan.md.nsmall, &[velocity, npt])?;
        self.backend.dump_snapshot(Path::new(MELT_SNAPSHOT))?;
        Ok(())
    }

    fn melt_check(&mut self) -> AppResult<()> {
        let snapshot = self.backend.read_snapshot(Path::new(MELT_SNAPSHOT))?;
        let fraction = self.classifier.classify_phase_fraction(&snapshot)?;
        self.ctx.solid_fraction = Some(fraction);
        info!(fraction, threshold = self.plan.melt_threshold, "solid fraction after melting");
        if fraction > self.plan.melt_threshold {
            return Err(AppError::DidNotMelt {
                fraction,
                threshold: self.plan.melt_threshold,
            });
        }
        Ok(())
    }

    fn equilibrate_target(&mut self) -> AppResult<()> {
        let t = self.plan.state.temperature();
        let solid = self.plan.phase == Phase::Solid;
        let velocity = EnsembleFix::Velocity {
            temperature: t,
            seed: self.seeds.next_seed(),
        };
        let npt = self.npt(t);
        self.backend
            .run_dynamics(self.plan.md.nsmall, &[velocity, npt.clone()])?;
        let average = EnsembleFix::AverageOutput {
            path: PathBuf::from(AVERAGE_FILE),
            every: AVERAGE_EVERY,
            msd: solid,
        };
        self.backend
            .run_dynamics(self.plan.md.nlarge, &[npt, average])?;
        self.backend.dump_snapshot(Path::new(CONF_SNAPSHOT))?;

        let series =
            self.backend
                .read_average_series(Path::new(AVERAGE_FILE), &self.plan.wait, self.cancel)?;
        let window = self.plan.md.averaging_window;
        let volume = series
            .mean_volume(window)
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| missing("positive mean volume in avg.dat"))?;
        let density = self.ctx.natoms as f64 / volume;
        info!(volume, density, rows = series.len(), "averaged target state");
        self.ctx.density = Some(density);
        if solid {
            let msd = series
                .mean_msd(window)
                .filter(|m| m.is_finite() && *m > 0.0)
                .ok_or_else(|| missing("mean squared displacement in avg.dat"))?;
            debug!(msd, "mean squared displacement");
            self.ctx.msd = Some(msd);
        }
        Ok(())
    }

    fn prepare_reference(&mut self) -> AppResult<()> {
        let t = self.plan.state.temperature();
        let density = self.ctx.density.ok_or_else(|| missing("density"))?;
        let (coupling, spring_constant) = match &self.plan.reference {
            ReferenceModel::UhlenbeckFord { p, sigma, .. } => {
                let uf = UhlenbeckFord::new(*p, *sigma)?;
                let coupling = ReferenceCoupling::UhlenbeckFord {
                    epsilon: uf.epsilon(t),
                    sigma: *sigma,
                    cutoff: UFM_CUTOFF,
                };
                (coupling, None)
            }
            ReferenceModel::EinsteinCrystal => {
                let msd = self.ctx.msd.ok_or_else(|| missing("mean squared displacement"))?;
                let k = spring_constant_from_msd(t, msd)?;
                (
                    ReferenceCoupling::EinsteinSprings { spring_constant: k },
                    Some(k),
                )
            }
        };
        let state = ReferenceState {
            temperature: t,
            density,
            natoms: self.ctx.natoms,
            mass: self.plan.mass,
            concentration: self.plan.state.concentration().to_vec(),
            spring_constant,
        };
        let breakdown = self.plan.reference.free_energy(&state)?;
        for (term, value) in breakdown.terms() {
            debug!(term = term.label(), value, "reference term");
        }
        info!(model = self.plan.reference.label(), f_ref = breakdown.total(), "reference prepared");
        self.ctx.coupling = Some(coupling);
        self.ctx.reference = Some(breakdown);
        Ok(())
    }

    /// Fresh box continuing from the equilibrated configuration.
    fn restart(&mut self, potential: &PotentialSpec) -> AppResult<()> {
        self.backend.reset()?;
        self.backend.configure(&self.plan.session)?;
        self.backend
            .build_box(&self.plan.structure, self.plan.ntypes())?;
        self.backend.load_snapshot(Path::new(CONF_SNAPSHOT))?;
        self.backend.set_potential(potential)?;
        Ok(())
    }

    /// Equilibrate at the start of `leg`, then ramp it.
    fn run_leg(
        &mut self,
        leg: &Leg,
        protocol: &SwitchingProtocol,
        replicate: usize,
        ensemble: &dyn Fn(&mut SeedStream) -> Vec<EnsembleFix>,
    ) -> AppResult<SwitchingSeries> {
        let mut fixes = ensemble(&mut self.seeds);
        fixes.push(EnsembleFix::Hold { lambda: leg.from });
        self.backend.run_dynamics(protocol.te, &fixes)?;

        let output = PathBuf::from(protocol.file_name(leg.direction, replicate));
        let mut fixes = ensemble(&mut self.seeds);
        fixes.push(EnsembleFix::Switch {
            from: leg.from,
            to: leg.to,
            output: output.clone(),
            stride: protocol.stride,
        });
        self.backend.run_dynamics(leg.steps, &fixes)?;
        let series = self.backend.read_scalar_series(
            &output,
            leg.direction,
            replicate,
            &self.plan.wait,
            self.cancel,
        )?;
        debug!(
            file = %output.display(),
            samples = series.len(),
            expected = protocol.expected_samples(),
            "read switching series"
        );
        Ok(series)
    }

    /// Forward and backward legs of every replicate of `protocol`.
    fn run_replicates(
        &mut self,
        stage: JobStage,
        protocol: &SwitchingProtocol,
        potential: &PotentialSpec,
        ensemble: &dyn Fn(&mut SeedStream) -> Vec<EnsembleFix>,
    ) -> AppResult<(Vec<SwitchingSeries>, Vec<SwitchingSeries>)> {
        let mut forward = Vec::with_capacity(protocol.nsims);
        let mut backward = Vec::with_capacity(protocol.nsims);
        for replicate in protocol.replicates() {
            self.check_cancel()?;
            self.emit(
                stage,
                Some(format!("replicate {replicate} of {}", protocol.nsims)),
                Some((replicate, protocol.nsims)),
            );
            self.restart(potential)?;
            let [fwd_leg, bwd_leg] = protocol.legs();
            forward.push(self.run_leg(&fwd_leg, protocol, replicate, ensemble)?);
            backward.push(self.run_leg(&bwd_leg, protocol, replicate, ensemble)?);
        }
        Ok((forward, backward))
    }

    fn switch(&mut self) -> AppResult<()> {
        let coupling = self
            .ctx
            .coupling
            .clone()
            .ok_or_else(|| missing("reference coupling"))?;
        let potential = self.plan.potential.clone().with_reference(coupling);
        let t = self.plan.state.temperature();
        let tdamp = self.plan.md.tdamp;
        let ensemble = move |seeds: &mut SeedStream| {
            vec![
                EnsembleFix::Nve,
                EnsembleFix::Langevin {
                    temperature: t,
                    tdamp,
                    seed: seeds.next_seed(),
                    zero_momentum: false,
                },
            ]
        };
        let protocol = self.plan.protocol.clone();
        let (forward, backward) =
            self.run_replicates(JobStage::Switch, &protocol, &potential, &ensemble)?;
        self.ctx.forward = forward;
        self.ctx.backward = backward;
        Ok(())
    }

    fn integrate(&mut self) -> AppResult<()> {
        let opts = IntegratorOptions {
            quadrature: self.plan.quadrature,
            lambda_start: self.plan.protocol.lambda_start(),
            lambda_end: self.plan.protocol.lambda_end(),
            ..IntegratorOptions::default()
        };
        let work = integrate_work_with(&self.ctx.forward, &self.ctx.backward, &opts)?;
        for r in &work.replicates {
            debug!(
                replicate = r.replicate,
                work = r.work,
                dissipation = r.dissipation(),
                "replicate work"
            );
            if r.dissipation() < 0.0 {
                warn!(replicate = r.replicate, "negative dissipation");
            }
        }
        let f_ref = self
            .ctx
            .reference
            .as_ref()
            .map(ReferenceBreakdown::total)
            .ok_or_else(|| missing("reference free energy"))?;
        let fe = f_ref - work.work;
        let fe = ti_core::ensure_finite(fe, "free energy")?;
        info!(work = work.work, error = work.error, fe, "integrated work");
        self.ctx.free_energy = Some(fe);
        self.ctx.work = Some(work);
        Ok(())
    }

    fn report(&mut self) -> AppResult<()> {
        let work = self.ctx.work.as_ref().ok_or_else(|| missing("work estimate"))?;
        let report = FreeEnergyReport {
            temperature: self.plan.state.temperature(),
            pressure: self.plan.state.pressure(),
            lattice: self.plan.lattice_name.clone(),
            concentration: self.plan.state.solute_fraction(),
            rho: self.ctx.density.ok_or_else(|| missing("density"))?,
            fe: self.ctx.free_energy.ok_or_else(|| missing("free energy"))?,
            fe_err: work.error,
        };
        let path = self.store.save_report(&self.plan.job_id, &report)?;
        info!(path = %path.display(), fe = report.fe, fe_err = report.fe_err, "report written");
        self.ctx.report = Some((report, path));
        Ok(())
    }

    fn sweep(&mut self) -> AppResult<()> {
        let Some(protocol) = self.plan.sweep.clone() else {
            return Ok(());
        };
        let potential = self
            .plan
            .potential
            .clone()
            .with_reference(ReferenceCoupling::PotentialScaling);
        let t0 = self.plan.state.temperature();
        let pressure = self.plan.state.pressure();
        let pdamp = self.plan.md.pdamp;
        let tdamp = self.plan.md.tdamp;
        let aniso = self.plan.phase == Phase::Solid;
        let ensemble = move |seeds: &mut SeedStream| {
            vec![
                EnsembleFix::Nph {
                    pressure,
                    pdamp,
                    aniso,
                },
                EnsembleFix::Langevin {
                    temperature: t0,
                    tdamp,
                    seed: seeds.next_seed(),
                    zero_momentum: true,
                },
            ]
        };
        let (forward, backward) =
            self.run_replicates(JobStage::Sweep, &protocol, &potential, &ensemble)?;
        let f0 = self.ctx.free_energy.ok_or_else(|| missing("free energy"))?;
        let sweep = integrate_reversible_scaling(&forward, &backward, &protocol, t0, f0)?;
        let path = self.backend.resolve(Path::new(SWEEP_FILE));
        sweep.write_dat(&path)?;
        info!(points = sweep.len(), path = %path.display(), "temperature sweep written");
        self.ctx.sweep = Some(sweep);
        Ok(())
    }

    fn manifest(&self, status: JobStatus) -> JobManifest {
        JobManifest {
            job_id: self.plan.job_id.clone(),
            label: self.plan.label.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            phase: self.plan.phase,
            reference: self.plan.reference.label().to_string(),
            seed: self.plan.seed,
            stages: self.visited.iter().map(|s| s.label().to_string()).collect(),
            status,
            sweep_file: self.ctx.sweep.as_ref().map(|_| SWEEP_FILE.to_string()),
        }
    }

    fn close_backend(&mut self) {
        if let Err(e) = self.backend.close() {
            warn!(error = %e, "engine did not close cleanly");
        }
    }

    fn finish(&mut self) -> Result<JobSummary, JobFailure> {
        self.enter(JobStage::Done, None);
        self.close_backend();
        if let Err(e) = self.store.save_manifest(&self.manifest(JobStatus::Done)) {
            warn!(error = %e, "could not write manifest");
        }
        let ctx = std::mem::take(&mut self.ctx);
        let missing_result = |what: &str| JobFailure::new(JobStage::Done, &missing(what));
        let (report, report_path) = ctx.report.ok_or_else(|| missing_result("report"))?;
        info!(elapsed_s = self.started.elapsed().as_secs_f64(), "job done");
        Ok(JobSummary {
            report,
            report_path,
            work: ctx.work.ok_or_else(|| missing_result("work estimate"))?,
            reference: ctx
                .reference
                .ok_or_else(|| missing_result("reference free energy"))?,
            solid_fraction: ctx.solid_fraction,
            sweep: ctx.sweep,
        })
    }

    fn abort(&mut self, failure: &JobFailure) {
        warn!(stage = %failure.stage, kind = %failure.kind, "{}", failure.message);
        self.enter(JobStage::Failed, Some(failure.to_string()));
        self.close_backend();
        if self.ctx.report.take().is_some() {
            if let Err(e) = self.store.discard_report(&self.plan.job_id) {
                warn!(error = %e, "could not discard report of failed job");
            }
        }
        let status = JobStatus::Failed {
            stage: failure.stage.label().to_string(),
            kind: failure.kind,
            message: failure.message.clone(),
        };
        if let Err(e) = self.store.save_manifest(&self.manifest(status)) {
            warn!(error = %e, "could not write manifest");
        }
    }
}

pub(crate) fn short_id(job_id: &str) -> &str {
    job_id.get(..12).unwrap_or(job_id)
}
