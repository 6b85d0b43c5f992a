use crate::{
    ChainEvent, JobId, JobSnapshot, JobType, PipelineMode, RequestError, Section, SubmissionError,
    SubmissionId, SubmissionOutput,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked a pipeline mode on the first wizard step.
    ModeSelected(PipelineMode),
    /// User edited a parameter field (raw text as typed).
    FieldEdited {
        section: Section,
        field: String,
        raw: String,
    },
    /// User toggled the optional CFD section.
    IncludeCfdToggled(bool),
    /// Model reference used by `cfd_case_only` submissions.
    ExistingModelChosen(Option<String>),
    NextClicked,
    PrevClicked,
    /// User confirmed on the last wizard step.
    SubmitClicked,
    /// Answer to the mode's confirmation prompt.
    PromptAnswered(bool),
    /// User abandoned the wizard.
    WizardCancelled,
    /// Engine progress for a dispatched submission.
    SubmissionProgress {
        submission: SubmissionId,
        event: ChainEvent,
    },
    /// Engine finished (or aborted) a submission chain.
    SubmissionFinished {
        submission: SubmissionId,
        result: Result<SubmissionOutput, SubmissionError>,
        at: Option<String>,
    },
    /// User asked to reconcile the registry with the backend job list.
    RefreshJobsClicked,
    JobsListed(Result<Vec<JobSnapshot>, RequestError>),
    /// Fixed-rate poll timer fired.
    PollTick,
    /// Status fetch answered for `job_id` (the id that was requested).
    JobStatusFetched {
        job_id: JobId,
        result: Result<JobSnapshot, RequestError>,
    },
    /// User selected a job for the detail view.
    JobSelected(JobId),
    /// Follow a backend job by id, registering it as `job_type` when the
    /// registry has not seen it (full-pipeline jobs are absent from `/jobs`).
    TrackJob { job_id: JobId, job_type: JobType },
    /// Stop polling a job. The backend keeps working on it.
    StopTrackingClicked(JobId),
    /// Fallback for placeholder wiring.
    NoOp,
}
