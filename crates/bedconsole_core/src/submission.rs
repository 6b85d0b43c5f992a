use serde::{Deserialize, Serialize};

use crate::{JobId, PipelineMode, PipelinePlan, PipelineStep, SubmissionError, ValidationError};

pub type SubmissionId = u64;

/// File references returned by the compile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledBed {
    pub bed_file: String,
    pub json_file: String,
}

/// Progress reported by the engine while it walks a submission's call chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    StepStarted {
        index: usize,
        total: usize,
        step: PipelineStep,
        at: String,
    },
    StepCompleted {
        index: usize,
        total: usize,
        step: PipelineStep,
        progress: u8,
        outputs: Vec<String>,
        at: String,
    },
    Note {
        message: String,
        at: String,
    },
}

impl ChainEvent {
    pub fn at(&self) -> &str {
        match self {
            ChainEvent::StepStarted { at, .. }
            | ChainEvent::StepCompleted { at, .. }
            | ChainEvent::Note { at, .. } => at,
        }
    }
}

/// What a successfully finished chain produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutput {
    Compiled(CompiledBed),
    ChainCompleted { outputs: Vec<String> },
    /// The backend took over and answered with its own job id.
    Accepted { job_id: JobId },
}

/// What `submit` hands back: either a direct reference or a job to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Compiled(CompiledBed),
    Tracked(JobId),
}

/// Latest submission outcome, kept for display after the wizard resets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Rejected(Vec<ValidationError>),
    Dispatched {
        submission: SubmissionId,
        mode: PipelineMode,
        job_id: Option<JobId>,
    },
    Finished {
        submission: SubmissionId,
        result: SubmissionResult,
    },
    Failed {
        submission: SubmissionId,
        job_id: Option<JobId>,
        error: SubmissionError,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingSubmission {
    pub(crate) plan: PipelinePlan,
    pub(crate) job_id: Option<JobId>,
}
