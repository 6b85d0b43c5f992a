//! Bed console core: pure wizard, submission and job-tracking state machine.
mod effect;
mod error;
mod job;
mod mode;
mod msg;
mod params;
mod poller;
mod registry;
mod state;
mod submission;
mod update;
mod view_model;
mod wizard;

pub use effect::Effect;
pub use error::{FailureKind, RequestError, SubmissionError};
pub use job::{Job, JobId, JobSnapshot, JobStatus, JobType, MergeOutcome};
pub use mode::{PipelineMode, PipelinePlan, PipelineStep, Prompt, UnknownMode};
pub use msg::Msg;
pub use params::{
    FieldDomain, FieldEdit, FieldSpec, FieldValue, ParameterBuilder, ParameterDocument, Section,
    SectionValues, UnknownSection, ValidationError,
};
pub use poller::{JobPoller, PollState, PollTrack, StatusEndpoint};
pub use registry::{JobRegistry, JobUpdate, RegistryConfig};
pub use state::AppState;
pub use submission::{
    ChainEvent, CompiledBed, SubmissionId, SubmissionOutput, SubmissionResult, SubmissionStatus,
};
pub use update::update;
pub use view_model::{
    AppViewModel, EditView, FieldView, JobDetailView, JobRowView, WizardView, LOG_TAIL,
};
pub use wizard::Step;
pub use wizard::Wizard;
