use crate::{JobId, ParameterDocument, PipelinePlan, StatusEndpoint, SubmissionId};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RunSubmission {
        submission: SubmissionId,
        plan: PipelinePlan,
        document: ParameterDocument,
        existing_model: Option<String>,
    },
    FetchJobStatus {
        job_id: JobId,
        endpoint: StatusEndpoint,
    },
    FetchJobList,
}
