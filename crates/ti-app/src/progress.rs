use core::fmt;

/// States of the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Init,
    BuildStructure,
    EquilibrateHigh,
    MeltCheck,
    EquilibrateTarget,
    PrepareReference,
    Switch,
    Integrate,
    Report,
    Sweep,
    Done,
    Failed,
}

impl JobStage {
    pub fn label(self) -> &'static str {
        match self {
            JobStage::Init => "INIT",
            JobStage::BuildStructure => "BUILD_STRUCTURE",
            JobStage::EquilibrateHigh => "EQUILIBRATE_HIGH",
            JobStage::MeltCheck => "MELT_CHECK",
            JobStage::EquilibrateTarget => "EQUILIBRATE_TARGET",
            JobStage::PrepareReference => "PREPARE_REFERENCE",
            JobStage::Switch => "SWITCH",
            JobStage::Integrate => "INTEGRATE",
            JobStage::Report => "REPORT",
            JobStage::Sweep => "SWEEP",
            JobStage::Done => "DONE",
            JobStage::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed)
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct JobProgressEvent {
    pub job_id: String,
    pub stage: JobStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    /// `(current, total)` while looping over replicates.
    pub replicate: Option<(usize, usize)>,
}

impl JobProgressEvent {
    pub fn stage(job_id: &str, stage: JobStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage,
            elapsed_wall_s,
            message,
            replicate: None,
        }
    }
}

/// Progress callback shared by jobs running on several threads.
pub type ProgressSink<'a> = &'a (dyn Fn(JobProgressEvent) + Sync);
