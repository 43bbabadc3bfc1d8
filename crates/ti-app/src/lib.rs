//! Application service layer for thermoint.
//!
//! Turns a job file into planned jobs, drives each one through the phase
//! state machine against a simulation backend, and persists the outcome.
//! Both the CLI and the integration tests go through this crate.

pub mod error;
pub mod job_service;
pub mod phase;
pub mod plan;
pub mod progress;
pub mod seeds;

pub use error::{AppError, AppResult, JobFailure};
pub use job_service::{
    BackendFactory, JobOutcome, JobService, LammpsFactory, RunOptions, list_reports, load_report,
};
pub use phase::{JobRunner, JobSummary, next_stage};
pub use plan::{JobPlan, plan_job, plan_jobs};
pub use progress::{JobProgressEvent, JobStage, ProgressSink};
pub use seeds::SeedStream;
