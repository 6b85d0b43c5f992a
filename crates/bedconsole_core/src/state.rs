use std::collections::BTreeMap;

use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::registry::job_gone_message;
use crate::submission::PendingSubmission;
use crate::{
    ChainEvent, Effect, FieldEdit, Job, JobId, JobPoller, JobRegistry, JobSnapshot, JobType,
    MergeOutcome, PollState, Prompt, RegistryConfig, RequestError, Section, StatusEndpoint,
    SubmissionError, SubmissionId, SubmissionOutput, SubmissionResult, SubmissionStatus, Wizard,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    wizard: Wizard,
    registry: JobRegistry,
    poller: JobPoller,
    pending: BTreeMap<SubmissionId, PendingSubmission>,
    next_submission: SubmissionId,
    prompt: Option<Prompt>,
    existing_model: Option<String>,
    last_submission: Option<SubmissionStatus>,
    last_edit: Option<(Section, String, FieldEdit)>,
    refresh_error: Option<String>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry_config(config: RegistryConfig) -> Self {
        Self {
            registry: JobRegistry::new(config),
            ..Self::default()
        }
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    pub fn prompt(&self) -> Option<Prompt> {
        self.prompt
    }

    pub fn last_submission(&self) -> Option<&SubmissionStatus> {
        self.last_submission.as_ref()
    }

    pub(crate) fn last_edit(&self) -> Option<&(Section, String, FieldEdit)> {
        self.last_edit.as_ref()
    }

    pub(crate) fn refresh_error(&self) -> Option<&str> {
        self.refresh_error.as_deref()
    }

    pub(crate) fn existing_model(&self) -> Option<&str> {
        self.existing_model.as_deref()
    }

    pub fn pending_submissions(&self) -> usize {
        self.pending.len()
    }

    /// Nothing in flight and nothing being polled.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty() && self.poller.active_count() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Registry write that also drops poll tracks of evicted jobs.
    fn apply_update(&mut self, update: crate::JobUpdate) -> MergeOutcome {
        let outcome = self.registry.apply(update);
        for job_id in self.registry.take_evicted() {
            self.poller.forget(&job_id);
        }
        outcome
    }

    pub(crate) fn select_mode(&mut self, mode: crate::PipelineMode) {
        if self.wizard.select_mode(mode) {
            engine_debug!("Mode {} selected", mode);
            self.mark_dirty();
        }
    }

    pub(crate) fn edit_field(&mut self, section: Section, field: String, raw: &str) {
        let outcome = self.wizard.set_field(section, &field, raw);
        self.last_edit = Some((section, field, outcome));
        self.mark_dirty();
    }

    pub(crate) fn set_include_cfd(&mut self, include: bool) {
        if self.wizard.include_optional_section() != include {
            self.wizard.set_include_optional_section(include);
            self.mark_dirty();
        }
    }

    pub(crate) fn set_existing_model(&mut self, model: Option<String>) {
        self.existing_model = model.filter(|path| !path.trim().is_empty());
        self.mark_dirty();
    }

    pub(crate) fn navigate(&mut self, forward: bool) {
        let moved = if forward {
            self.wizard.next()
        } else {
            self.wizard.prev()
        };
        if moved {
            self.mark_dirty();
        }
    }

    /// Confirmation step: ask the mode's prompt first if it has one.
    pub(crate) fn request_submit(&mut self) -> Vec<Effect> {
        if !self.wizard.at_confirmation() || self.prompt.is_some() {
            return Vec::new();
        }
        let Some(mode) = self.wizard.mode() else {
            return Vec::new();
        };
        match mode.prompt() {
            Some(prompt) => {
                self.prompt = Some(prompt);
                self.mark_dirty();
                Vec::new()
            }
            None => self.dispatch(true),
        }
    }

    pub(crate) fn answer_prompt(&mut self, confirmed: bool) -> Vec<Effect> {
        if self.prompt.take().is_none() {
            return Vec::new();
        }
        self.mark_dirty();
        self.dispatch(confirmed)
    }

    pub(crate) fn cancel_wizard(&mut self) {
        self.wizard.reset();
        self.prompt = None;
        self.existing_model = None;
        self.last_submission = Some(SubmissionStatus::Cancelled);
        self.mark_dirty();
    }

    fn dispatch(&mut self, confirmed: bool) -> Vec<Effect> {
        let Some(mode) = self.wizard.mode() else {
            return Vec::new();
        };
        let document = self.wizard.snapshot();
        if let Err(errors) = document.validate() {
            engine_warn!(
                "Submission rejected: {} invalid parameter(s)",
                errors.len()
            );
            self.last_submission = Some(SubmissionStatus::Rejected(errors));
            self.mark_dirty();
            return Vec::new();
        }

        let plan = mode.plan(confirmed);
        let submission = self.next_submission;
        self.next_submission += 1;

        let job_id = if plan.creates_local_job() {
            let job_id = JobId::local(submission);
            self.apply_update(crate::JobUpdate::Register(Job::queued(
                job_id.clone(),
                mode.job_type(),
            )));
            self.registry.select(&job_id);
            Some(job_id)
        } else {
            None
        };

        engine_info!(
            "Dispatching submission {} mode={} steps={:?}",
            submission,
            mode,
            plan.steps()
        );
        self.pending.insert(
            submission,
            PendingSubmission {
                plan: plan.clone(),
                job_id: job_id.clone(),
            },
        );
        self.last_submission = Some(SubmissionStatus::Dispatched {
            submission,
            mode,
            job_id,
        });
        let existing_model = if plan.steps().contains(&crate::PipelineStep::CreateCfdCaseOnly) {
            self.existing_model.take()
        } else {
            None
        };
        self.wizard.reset();
        self.existing_model = None;
        self.mark_dirty();

        vec![Effect::RunSubmission {
            submission,
            plan,
            document,
            existing_model,
        }]
    }

    pub(crate) fn apply_submission_progress(
        &mut self,
        submission: SubmissionId,
        event: ChainEvent,
    ) {
        let Some(job_id) = self
            .pending
            .get(&submission)
            .and_then(|pending| pending.job_id.clone())
        else {
            return;
        };
        if self.apply_update(crate::JobUpdate::Chain { job_id, event }) == MergeOutcome::Applied {
            self.mark_dirty();
        }
    }

    pub(crate) fn apply_submission_finished(
        &mut self,
        submission: SubmissionId,
        result: Result<SubmissionOutput, SubmissionError>,
        at: Option<String>,
    ) {
        let Some(pending) = self.pending.remove(&submission) else {
            engine_debug!("Ignoring result of unknown submission {}", submission);
            return;
        };
        let mode = pending.plan.mode();
        let status = match result {
            Ok(SubmissionOutput::Compiled(compiled)) => {
                if let Some(job_id) = pending.job_id {
                    self.apply_update(crate::JobUpdate::Finished {
                        job_id,
                        outputs: vec![compiled.bed_file.clone(), compiled.json_file.clone()],
                        at,
                    });
                }
                SubmissionStatus::Finished {
                    submission,
                    result: SubmissionResult::Compiled(compiled),
                }
            }
            Ok(SubmissionOutput::ChainCompleted { outputs }) => match pending.job_id {
                Some(job_id) => {
                    self.apply_update(crate::JobUpdate::Finished {
                        job_id: job_id.clone(),
                        outputs,
                        at,
                    });
                    SubmissionStatus::Finished {
                        submission,
                        result: SubmissionResult::Tracked(job_id),
                    }
                }
                None => {
                    engine_warn!("Chain for submission {} finished without a job", submission);
                    return;
                }
            },
            Ok(SubmissionOutput::Accepted { job_id }) => {
                let job_type = mode.job_type();
                self.apply_update(crate::JobUpdate::Register(Job::queued(
                    job_id.clone(),
                    job_type,
                )));
                self.registry.select(&job_id);
                if self
                    .registry
                    .get(&job_id)
                    .is_some_and(|job| !job.is_terminal())
                {
                    self.poller
                        .start(job_id.clone(), StatusEndpoint::for_job_type(job_type));
                }
                SubmissionStatus::Finished {
                    submission,
                    result: SubmissionResult::Tracked(job_id),
                }
            }
            Err(error) => {
                engine_warn!("Submission {} failed: {}", submission, error);
                if let Some(job_id) = &pending.job_id {
                    self.apply_update(crate::JobUpdate::Failed {
                        job_id: job_id.clone(),
                        message: error.to_string(),
                        at,
                    });
                }
                SubmissionStatus::Failed {
                    submission,
                    job_id: pending.job_id,
                    error,
                }
            }
        };
        self.last_submission = Some(status);
        self.mark_dirty();
    }

    pub(crate) fn poll_tick(&self) -> Vec<Effect> {
        self.poller
            .due()
            .into_iter()
            .map(|(job_id, endpoint)| Effect::FetchJobStatus { job_id, endpoint })
            .collect()
    }

    pub(crate) fn apply_job_status(
        &mut self,
        job_id: JobId,
        result: Result<JobSnapshot, RequestError>,
    ) {
        if !self.poller.is_polling(&job_id) {
            engine_debug!("Discarding stale status for job {}", job_id);
            return;
        }
        match result {
            Ok(snapshot) if snapshot.job_id != job_id => {
                engine_warn!(
                    "Status for {} answered with job {}; discarding",
                    job_id,
                    snapshot.job_id
                );
            }
            Ok(snapshot) => {
                self.poller.record_success(&job_id);
                match self.apply_update(crate::JobUpdate::Remote(snapshot)) {
                    MergeOutcome::Applied => self.mark_dirty(),
                    MergeOutcome::Stale => {
                        engine_debug!("Ignoring regressive status for job {}", job_id)
                    }
                    MergeOutcome::Unchanged => {}
                }
                let terminal = self
                    .registry
                    .get(&job_id)
                    .map_or(true, |job| job.is_terminal());
                if terminal {
                    engine_info!("Job {} reached a terminal state; polling stopped", job_id);
                    self.poller.stop(&job_id);
                    self.mark_dirty();
                }
            }
            Err(error) if error.kind.is_job_gone() => {
                engine_warn!("Job {} is unknown to the backend: {}", job_id, error);
                self.apply_update(crate::JobUpdate::Failed {
                    job_id: job_id.clone(),
                    message: job_gone_message(&error.message),
                    at: None,
                });
                self.poller.stop(&job_id);
                self.mark_dirty();
            }
            Err(error) => {
                engine_warn!("Polling job {} failed, retrying next tick: {}", job_id, error);
                self.poller.record_failure(&job_id, &error);
                self.mark_dirty();
            }
        }
    }

    pub(crate) fn apply_job_list(&mut self, result: Result<Vec<JobSnapshot>, RequestError>) {
        let snapshots = match result {
            Ok(snapshots) => snapshots,
            Err(error) => {
                engine_warn!("Listing jobs failed: {}", error);
                self.refresh_error = Some(error.to_string());
                self.mark_dirty();
                return;
            }
        };
        self.refresh_error = None;
        for snapshot in snapshots {
            let job_id = snapshot.job_id.clone();
            self.apply_update(crate::JobUpdate::Remote(snapshot));
            let Some(job) = self.registry.get(&job_id) else {
                continue;
            };
            let untracked = self.poller.state(&job_id) == PollState::Idle;
            if untracked && !job.is_terminal() && !job_id.is_local() {
                self.poller
                    .start(job_id, StatusEndpoint::for_job_type(job.job_type()));
            }
        }
        self.mark_dirty();
    }

    pub(crate) fn select_job(&mut self, job_id: &JobId) {
        if self.registry.select(job_id) {
            self.mark_dirty();
        }
    }

    pub(crate) fn track_job(&mut self, job_id: JobId, job_type: JobType) {
        if job_id.is_local() {
            self.select_job(&job_id);
            return;
        }
        if !self.registry.contains(&job_id) {
            self.apply_update(crate::JobUpdate::Register(Job::queued(
                job_id.clone(),
                job_type,
            )));
        }
        let Some(job) = self.registry.get(&job_id) else {
            return;
        };
        if !job.is_terminal() && !self.poller.is_polling(&job_id) {
            let endpoint = StatusEndpoint::for_job_type(job.job_type());
            engine_info!("Tracking job {} on {:?}", job_id, endpoint);
            self.poller.start(job_id.clone(), endpoint);
        }
        self.registry.select(&job_id);
        self.mark_dirty();
    }

    pub(crate) fn stop_tracking(&mut self, job_id: &JobId) {
        if self.poller.stop(job_id) {
            engine_info!("Stopped tracking job {}; backend work continues", job_id);
            self.mark_dirty();
        }
    }
}
