//! Job directory storage API.
//!
//! Every job owns `<root>/<job_id>/`. The engine writes its artifacts
//! there; the store adds `report.yaml` for successful jobs and a
//! `manifest.json` for every job that ran. Only a report next to a DONE
//! manifest counts as complete.

use crate::types::{FreeEnergyReport, JobManifest};
use crate::{ResultsError, ResultsResult};
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "report.yaml";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Clone, Debug)]
pub struct ReportStore {
    root_dir: PathBuf,
}

impl ReportStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Store rooted at `working_root`, taken relative to the job file's directory.
    pub fn for_job_file(job_path: &Path, working_root: &str) -> ResultsResult<Self> {
        let base = job_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(base.join(working_root))
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root_dir.join(job_id)
    }

    /// Create (or reuse) the job's working directory.
    pub fn prepare_job_dir(&self, job_id: &str) -> ResultsResult<PathBuf> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn has_report(&self, job_id: &str) -> bool {
        self.job_dir(job_id).join(REPORT_FILE).exists()
    }

    /// A report exists and the manifest says the job finished.
    pub fn is_complete(&self, job_id: &str) -> bool {
        self.has_report(job_id)
            && self
                .load_manifest(job_id)
                .is_ok_and(|m| m.status.is_done())
    }

    /// Remove the report of a job that failed after writing it.
    pub fn discard_report(&self, job_id: &str) -> ResultsResult<()> {
        let path = self.job_dir(job_id).join(REPORT_FILE);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Persist the report of a finished job. Reports are written once.
    pub fn save_report(&self, job_id: &str, report: &FreeEnergyReport) -> ResultsResult<PathBuf> {
        report.check()?;
        if self.has_report(job_id) {
            return Err(ResultsError::AlreadyReported {
                job_id: job_id.to_string(),
            });
        }
        let dir = self.prepare_job_dir(job_id)?;
        let path = dir.join(REPORT_FILE);
        let report_yaml = serde_yaml::to_string(report)?;
        fs::write(&path, report_yaml)?;
        Ok(path)
    }

    /// Write (or replace) the manifest; failed jobs get a manifest and no report.
    pub fn save_manifest(&self, manifest: &JobManifest) -> ResultsResult<()> {
        let dir = self.prepare_job_dir(&manifest.job_id)?;
        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(dir.join(MANIFEST_FILE), manifest_json)?;
        Ok(())
    }

    pub fn load_manifest(&self, job_id: &str) -> ResultsResult<JobManifest> {
        let manifest_path = self.job_dir(job_id).join(MANIFEST_FILE);

        if !manifest_path.exists() {
            return Err(ResultsError::JobNotFound {
                job_id: job_id.to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    pub fn load_report(&self, job_id: &str) -> ResultsResult<FreeEnergyReport> {
        let report_path = self.job_dir(job_id).join(REPORT_FILE);

        if !report_path.exists() {
            return Err(ResultsError::JobNotFound {
                job_id: job_id.to_string(),
            });
        }

        let content = fs::read_to_string(report_path)?;
        let report = serde_yaml::from_str(&content)?;
        Ok(report)
    }

    /// Manifests of every job under the root, oldest first.
    pub fn list_jobs(&self) -> ResultsResult<Vec<JobManifest>> {
        let mut jobs = Vec::new();

        if !self.root_dir.exists() {
            return Ok(jobs);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let job_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&job_id) {
                    jobs.push(manifest);
                }
            }
        }
        jobs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        Ok(jobs)
    }

    pub fn delete_job(&self, job_id: &str) -> ResultsResult<()> {
        let dir = self.job_dir(job_id);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}
