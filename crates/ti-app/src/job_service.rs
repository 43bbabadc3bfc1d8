//! Job execution and caching service.

use crate::error::{AppError, AppResult, JobFailure};
use crate::phase::{JobRunner, JobSummary, short_id};
use crate::plan::JobPlan;
use crate::progress::{JobProgressEvent, JobStage, ProgressSink};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use ti_backend::{
    BackendResult, LammpsBackend, LammpsLauncher, PhaseClassifier, SimulationBackend,
    SteinhardtClassifier,
};
use ti_core::CancelToken;
use ti_project::BackendDef;
use ti_results::{FreeEnergyReport, JobManifest, JobStatus, ReportStore};
use tracing::{info, warn};

/// Opens a fresh engine for one job.
pub trait BackendFactory: Send + Sync {
    fn create(&self, plan: &JobPlan, dir: &Path) -> BackendResult<Box<dyn SimulationBackend>>;
}

impl<F> BackendFactory for F
where
    F: Fn(&JobPlan, &Path) -> BackendResult<Box<dyn SimulationBackend>> + Send + Sync,
{
    fn create(&self, plan: &JobPlan, dir: &Path) -> BackendResult<Box<dyn SimulationBackend>> {
        self(plan, dir)
    }
}

/// Starts one LAMMPS process per job.
#[derive(Debug, Clone)]
pub struct LammpsFactory {
    pub launcher: LammpsLauncher,
}

impl LammpsFactory {
    pub fn from_backend_def(def: &BackendDef) -> Self {
        Self {
            launcher: LammpsLauncher::with_cores(&def.executable, def.cores)
                .with_args(def.arguments.iter().cloned()),
        }
    }
}

impl BackendFactory for LammpsFactory {
    fn create(&self, _plan: &JobPlan, dir: &Path) -> BackendResult<Box<dyn SimulationBackend>> {
        Ok(Box::new(LammpsBackend::start(self.launcher.clone(), dir)?))
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Reuse a finished report with the same job id.
    pub use_cache: bool,
    /// Wall-clock limit per job; exceeding it cancels the job.
    pub timeout: Option<Duration>,
    /// Worker threads for independent jobs; 0 lets rayon decide.
    pub parallel_jobs: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            timeout: None,
            parallel_jobs: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: String,
    pub label: String,
    pub stages: Vec<JobStage>,
    pub result: Result<FreeEnergyReport, JobFailure>,
    /// Full results of a job that ran in this call.
    pub summary: Option<JobSummary>,
    pub loaded_from_cache: bool,
}

impl JobOutcome {
    pub fn is_done(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct JobService<F: BackendFactory> {
    factory: F,
    store: ReportStore,
    classifier: Arc<dyn PhaseClassifier>,
    options: RunOptions,
    cancel: CancelToken,
}

impl<F: BackendFactory> JobService<F> {
    pub fn new(factory: F, store: ReportStore) -> Self {
        Self {
            factory,
            store,
            classifier: Arc::new(SteinhardtClassifier::default()),
            options: RunOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn PhaseClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token shared by every job; cancelling it stops them all.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Execute one job, or load its report from the cache.
    pub fn run_job(&self, plan: &JobPlan, progress: Option<ProgressSink<'_>>) -> JobOutcome {
        if self.options.use_cache && self.store.is_complete(&plan.job_id) {
            match self.store.load_report(&plan.job_id) {
                Ok(report) => {
                    info!(job = short_id(&plan.job_id), label = %plan.label, "loaded cached report");
                    if let Some(sink) = progress {
                        sink(JobProgressEvent::stage(
                            &plan.job_id,
                            JobStage::Done,
                            0.0,
                            Some("loaded cached report".to_string()),
                        ));
                    }
                    return JobOutcome {
                        job_id: plan.job_id.clone(),
                        label: plan.label.clone(),
                        stages: vec![JobStage::Done],
                        result: Ok(report),
                        summary: None,
                        loaded_from_cache: true,
                    };
                }
                Err(e) => warn!(error = %e, "cached report unreadable, rerunning"),
            }
        }

        let backend = self
            .store
            .delete_job(&plan.job_id)
            .and_then(|()| self.store.prepare_job_dir(&plan.job_id))
            .map_err(AppError::from)
            .and_then(|dir| Ok(self.factory.create(plan, &dir)?));
        let mut backend = match backend {
            Ok(b) => b,
            Err(e) => return self.failed_to_start(plan, &e),
        };

        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        let runner = JobRunner::new(
            plan,
            backend.as_mut(),
            self.classifier.as_ref(),
            &self.store,
            &self.cancel,
        )
        .with_progress(progress)
        .with_deadline(deadline);
        let (stages, result) = runner.run();

        JobOutcome {
            job_id: plan.job_id.clone(),
            label: plan.label.clone(),
            stages,
            result: result.as_ref().map(|s| s.report.clone()).map_err(Clone::clone),
            summary: result.ok(),
            loaded_from_cache: false,
        }
    }

    fn failed_to_start(&self, plan: &JobPlan, error: &AppError) -> JobOutcome {
        let failure = JobFailure::new(JobStage::Init, error);
        warn!(job = short_id(&plan.job_id), "{failure}");
        let manifest = JobManifest {
            job_id: plan.job_id.clone(),
            label: plan.label.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            phase: plan.phase,
            reference: plan.reference.label().to_string(),
            seed: plan.seed,
            stages: vec![JobStage::Init.label().to_string(), JobStage::Failed.label().to_string()],
            status: JobStatus::Failed {
                stage: JobStage::Init.label().to_string(),
                kind: failure.kind,
                message: failure.message.clone(),
            },
            sweep_file: None,
        };
        if let Err(e) = self.store.save_manifest(&manifest) {
            warn!(error = %e, "could not write manifest");
        }
        JobOutcome {
            job_id: plan.job_id.clone(),
            label: plan.label.clone(),
            stages: vec![JobStage::Init, JobStage::Failed],
            result: Err(failure),
            summary: None,
            loaded_from_cache: false,
        }
    }

    /// Run independent jobs concurrently. Outcomes keep the order of `plans`.
    pub fn run_jobs(
        &self,
        plans: &[JobPlan],
        progress: Option<ProgressSink<'_>>,
    ) -> AppResult<Vec<JobOutcome>> {
        let run_all = || {
            plans
                .par_iter()
                .map(|plan| self.run_job(plan, progress))
                .collect::<Vec<_>>()
        };
        if self.options.parallel_jobs == 0 {
            return Ok(run_all());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallel_jobs)
            .build()
            .map_err(|e| AppError::InvalidInput(format!("thread pool: {e}")))?;
        Ok(pool.install(run_all))
    }
}

/// Manifests of every job under the store, oldest first.
pub fn list_reports(store: &ReportStore) -> AppResult<Vec<JobManifest>> {
    Ok(store.list_jobs()?)
}

pub fn load_report(store: &ReportStore, job_id: &str) -> AppResult<(JobManifest, FreeEnergyReport)> {
    let manifest = store.load_manifest(job_id)?;
    let report = store.load_report(job_id)?;
    Ok((manifest, report))
}
