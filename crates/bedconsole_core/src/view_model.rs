use serde_json::{Map, Value};

use crate::{
    AppState, FieldEdit, FieldValue, JobId, JobStatus, JobType, PollState, Prompt, Section,
    SubmissionStatus,
};

/// How many trailing log lines the detail view carries.
pub const LOG_TAIL: usize = 20;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub wizard: WizardView,
    pub prompt: Option<Prompt>,
    pub last_submission: Option<SubmissionStatus>,
    pub jobs: Vec<JobRowView>,
    pub selected: Option<JobDetailView>,
    pub polling_count: usize,
    pub refresh_error: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WizardView {
    pub step_index: usize,
    pub step_title: &'static str,
    pub mode: Option<String>,
    pub can_go_next: bool,
    pub can_go_prev: bool,
    pub include_cfd: bool,
    pub existing_model: Option<String>,
    /// Fields of the section on the current step, in declaration order.
    pub fields: Vec<FieldView>,
    pub last_edit: Option<EditView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub name: &'static str,
    pub value: Option<FieldValue>,
    pub problem: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditView {
    pub section: Section,
    pub field: String,
    pub outcome: FieldEdit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: u8,
    pub polling: PollState,
    pub selected: bool,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDetailView {
    pub job_id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: u8,
    /// Total number of log lines; `log_tail` holds the last few of them.
    pub log_count: usize,
    pub log_tail: Vec<String>,
    pub output_files: Vec<String>,
    pub error_message: Option<String>,
    pub metadata: Map<String, Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub poll_errors: u32,
    pub last_poll_error: Option<String>,
}

impl AppState {
    pub fn view(&self) -> AppViewModel {
        let wizard = self.wizard();
        let step = wizard.step();
        let fields = step
            .section()
            .map(|section| {
                section
                    .fields()
                    .iter()
                    .map(|spec| {
                        let value = wizard.document().get(section, spec.name).cloned();
                        let problem = match &value {
                            Some(value) => spec.domain.check(value).err(),
                            None => None,
                        };
                        FieldView {
                            name: spec.name,
                            value,
                            problem,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let selected_id = self.registry().selected_id();
        let jobs = self
            .registry()
            .jobs()
            .map(|job| JobRowView {
                job_id: job.id().clone(),
                job_type: job.job_type(),
                status: job.status(),
                progress: job.progress(),
                polling: self.poller().state(job.id()),
                selected: selected_id == Some(job.id()),
                updated_at: job.updated_at().map(ToOwned::to_owned),
            })
            .collect();

        let selected = self.registry().selected().map(|job| {
            let track = self.poller().track(job.id());
            let skip = job.logs().len().saturating_sub(LOG_TAIL);
            JobDetailView {
                job_id: job.id().clone(),
                job_type: job.job_type(),
                status: job.status(),
                progress: job.progress(),
                log_count: job.logs().len(),
                log_tail: job.logs()[skip..].to_vec(),
                output_files: job.output_files().to_vec(),
                error_message: job.error_message().map(ToOwned::to_owned),
                metadata: job.metadata().clone(),
                created_at: job.created_at().map(ToOwned::to_owned),
                updated_at: job.updated_at().map(ToOwned::to_owned),
                poll_errors: track.map_or(0, |track| track.consecutive_errors),
                last_poll_error: track.and_then(|track| track.last_error.clone()),
            }
        });

        AppViewModel {
            wizard: WizardView {
                step_index: wizard.step_index(),
                step_title: step.title(),
                mode: wizard.mode().map(|mode| mode.to_string()),
                can_go_next: wizard.can_go_next(),
                can_go_prev: wizard.can_go_prev(),
                include_cfd: wizard.include_optional_section(),
                existing_model: self.existing_model().map(ToOwned::to_owned),
                fields,
                last_edit: self.last_edit().map(|(section, field, outcome)| EditView {
                    section: *section,
                    field: field.clone(),
                    outcome: outcome.clone(),
                }),
            },
            prompt: self.prompt(),
            last_submission: self.last_submission().cloned(),
            jobs,
            selected,
            polling_count: self.poller().active_count(),
            refresh_error: self.refresh_error().map(ToOwned::to_owned),
            dirty: self.is_dirty(),
        }
    }
}
