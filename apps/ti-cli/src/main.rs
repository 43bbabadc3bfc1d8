mod logging;

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ti_app::{
    AppError, AppResult, BackendFactory, JobOutcome, JobPlan, JobProgressEvent, JobService,
    LammpsFactory, RunOptions, list_reports, load_report, plan_jobs,
};
use ti_backend::{BackendResult, ReplayBackend, ReplayScript, SimulationBackend};
use ti_core::Crystal;
use ti_project::JobFile;
use ti_results::{JobStatus, ReportStore};
use tracing::info;

#[derive(Parser)]
#[command(name = "thermoint")]
#[command(about = "Free energies of solids and liquids by non-equilibrium thermodynamic integration", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Suppress all log output
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a job file
    Validate {
        /// Path to the job file (YAML or JSON)
        job_path: PathBuf,
    },
    /// Show the planned jobs of a job file without running them
    Plan {
        job_path: PathBuf,
    },
    /// Show reference lattice data for an element
    Lattice {
        /// Element symbol, e.g. Cu
        element: String,
    },
    /// Run every calculation of a job file
    Run {
        job_path: PathBuf,
        /// Skip cached reports and force a re-run
        #[arg(long)]
        no_cache: bool,
        /// Drive the canned replay engine instead of LAMMPS
        #[arg(long)]
        replay: bool,
        /// Jobs run at once (0 = one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Wall-clock limit per job in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },
    /// List finished and failed jobs of a job file
    Reports {
        job_path: PathBuf,
    },
    /// Print the report of one job
    Report {
        job_path: PathBuf,
        job_id: String,
    },
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file)?;

    match cli.command {
        Commands::Validate { job_path } => cmd_validate(&job_path),
        Commands::Plan { job_path } => cmd_plan(&job_path),
        Commands::Lattice { element } => cmd_lattice(&element),
        Commands::Run {
            job_path,
            no_cache,
            replay,
            jobs,
            timeout,
        } => cmd_run(&job_path, !no_cache, replay, jobs, timeout),
        Commands::Reports { job_path } => cmd_reports(&job_path),
        Commands::Report { job_path, job_id } => cmd_report(&job_path, &job_id),
    }
}

fn load_job(job_path: &Path) -> AppResult<JobFile> {
    let job = match job_path.extension().and_then(|e| e.to_str()) {
        Some("json") => ti_project::load_json(job_path)?,
        _ => ti_project::load_yaml(job_path)?,
    };
    Ok(job)
}

fn base_dir(job_path: &Path) -> &Path {
    job_path.parent().unwrap_or_else(|| Path::new("."))
}

fn store_for(job_path: &Path, job: &JobFile) -> AppResult<ReportStore> {
    Ok(ReportStore::for_job_file(job_path, &job.backend.working_root)?)
}

fn cmd_validate(job_path: &Path) -> AppResult<()> {
    println!("Validating job file: {}", job_path.display());
    let job = load_job(job_path)?;
    ti_project::validate_job_file(&job).map_err(ti_project::ProjectError::from)?;
    let plans = plan_jobs(&job, base_dir(job_path))?;
    println!("✓ Job file is valid ({} calculations)", plans.len());
    Ok(())
}

fn cmd_plan(job_path: &Path) -> AppResult<()> {
    let job = load_job(job_path)?;
    let plans = plan_jobs(&job, base_dir(job_path))?;
    for plan in &plans {
        println!("{}  {}", short(&plan.job_id), plan.label);
        println!(
            "  lattice={}  atoms={}  reference={}  replicates={}",
            plan.lattice_name,
            plan.natoms(),
            plan.reference.label(),
            plan.protocol.nsims
        );
        if let Some(t_high) = plan.state.temperature_high() {
            println!("  melt at {t_high} K");
        }
        if let Some(t_stop) = plan.temperature_stop() {
            println!("  sweep {} K -> {t_stop} K", plan.state.temperature());
        }
    }
    Ok(())
}

fn cmd_lattice(symbol: &str) -> AppResult<()> {
    let data = ti_project::element(symbol)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown element {symbol}")))?;
    println!(
        "{}: {} a={} Å  mass={} amu",
        data.symbol, data.structure, data.lattice_constant, data.mass
    );
    for target in Crystal::ALL {
        let factor = ti_project::conversion_factor(data.structure, target);
        println!(
            "  {:<4} a={:.4} Å",
            target.label(),
            data.lattice_constant * factor
        );
    }
    Ok(())
}

fn cmd_run(
    job_path: &Path,
    use_cache: bool,
    replay: bool,
    jobs: Option<usize>,
    timeout: Option<f64>,
) -> AppResult<()> {
    let job = load_job(job_path)?;
    let plans = plan_jobs(&job, base_dir(job_path))?;
    let store = store_for(job_path, &job)?;
    let timeout = timeout
        .map(|s| {
            Duration::try_from_secs_f64(s)
                .map_err(|e| AppError::InvalidInput(format!("timeout {s}: {e}")))
        })
        .transpose()?;
    let options = RunOptions {
        use_cache,
        timeout,
        parallel_jobs: jobs.unwrap_or(job.main.parallel_jobs),
    };
    info!(jobs = plans.len(), store = %store.root().display(), "running job file");

    let outcomes = if replay {
        let factory = |_plan: &JobPlan, dir: &Path| -> BackendResult<Box<dyn SimulationBackend>> {
            Ok(Box::new(ReplayBackend::new(dir, ReplayScript::default())?))
        };
        execute(factory, store, options, &plans)?
    } else {
        execute(LammpsFactory::from_backend_def(&job.backend), store, options, &plans)?
    };
    clear_progress_line();

    let mut first_failure = None;
    for outcome in &outcomes {
        print_outcome(outcome);
        if let Err(f) = &outcome.result {
            first_failure.get_or_insert_with(|| f.clone());
        }
    }
    match first_failure {
        Some(f) => Err(AppError::Job(f)),
        None => Ok(()),
    }
}

fn execute<F: BackendFactory>(
    factory: F,
    store: ReportStore,
    options: RunOptions,
    plans: &[JobPlan],
) -> AppResult<Vec<JobOutcome>> {
    let service = JobService::new(factory, store).with_options(options);
    let progress = |event: JobProgressEvent| render_progress(&event);
    service.run_jobs(plans, Some(&progress))
}

fn print_outcome(outcome: &JobOutcome) {
    match &outcome.result {
        Ok(report) => {
            let origin = if outcome.loaded_from_cache {
                "cached"
            } else {
                "done"
            };
            println!("✓ {} ({origin}) {}", outcome.label, short(&outcome.job_id));
            println!(
                "  F = {:.6} ± {:.6} eV/atom  rho = {:.6} 1/Å³",
                report.fe, report.fe_err, report.rho
            );
            if let Some(sweep) = outcome.summary.as_ref().and_then(|s| s.sweep.as_ref()) {
                println!("  temperature sweep: {} points", sweep.len());
            }
        }
        Err(failure) => {
            println!("✗ {} {}", outcome.label, short(&outcome.job_id));
            println!("  FAILED at {} ({}): {}", failure.stage, failure.kind, failure.message);
        }
    }
}

fn cmd_reports(job_path: &Path) -> AppResult<()> {
    let job = load_job(job_path)?;
    let store = store_for(job_path, &job)?;
    let manifests = list_reports(&store)?;
    if manifests.is_empty() {
        println!("No jobs found under {}", store.root().display());
        return Ok(());
    }
    for m in manifests {
        let status = match &m.status {
            JobStatus::Done => "DONE".to_string(),
            JobStatus::Failed { stage, kind, .. } => format!("FAILED at {stage} ({kind})"),
        };
        println!("{}  {:<28} {:<20} {}", short(&m.job_id), m.label, status, m.timestamp);
    }
    Ok(())
}

fn cmd_report(job_path: &Path, job_id: &str) -> AppResult<()> {
    let job = load_job(job_path)?;
    let store = store_for(job_path, &job)?;
    let (manifest, report) = load_report(&store, job_id)?;
    println!("# {} ({})", manifest.label, manifest.reference);
    let text = serde_yaml::to_string(&report)
        .map_err(|e| AppError::InvalidInput(format!("report {job_id}: {e}")))?;
    print!("{text}");
    Ok(())
}

fn short(job_id: &str) -> &str {
    job_id.get(..12).unwrap_or(job_id)
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_progress(event: &JobProgressEvent) {
    let replicate = event
        .replicate
        .map(|(i, n)| format!("  replicate {i}/{n}"))
        .unwrap_or_default();
    print!(
        "\r{}  {:<18}{}  elapsed={:.1}s    ",
        short(&event.job_id),
        event.stage.label(),
        replicate,
        event.elapsed_wall_s
    );
    let _ = io::stdout().flush();
}
