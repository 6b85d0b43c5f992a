use bedconsole_core::{
    ChainEvent, JobId, JobSnapshot, RequestError, SubmissionError, SubmissionId, SubmissionOutput,
};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SubmissionProgress {
        submission: SubmissionId,
        event: ChainEvent,
    },
    SubmissionFinished {
        submission: SubmissionId,
        result: Result<SubmissionOutput, SubmissionError>,
        at: String,
    },
    JobStatusFetched {
        job_id: JobId,
        result: Result<JobSnapshot, RequestError>,
    },
    JobsListed(Result<Vec<JobSnapshot>, RequestError>),
}

/// Answer of the model generation endpoint: either the finished model or a
/// backend job to wait on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ModelGeneration {
    Ready {
        #[serde(alias = "blend_file")]
        model_path: String,
        #[serde(default)]
        exported_formats: Vec<String>,
    },
    Queued {
        job_id: JobId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaseCreated {
    #[serde(alias = "case_path")]
    pub case_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct JobAccepted {
    pub(crate) job_id: JobId,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to build http client: {0}")]
    Client(#[from] RequestError),
}
