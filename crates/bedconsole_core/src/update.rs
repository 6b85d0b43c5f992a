use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ModeSelected(mode) => {
            state.select_mode(mode);
            Vec::new()
        }
        Msg::FieldEdited {
            section,
            field,
            raw,
        } => {
            state.edit_field(section, field, &raw);
            Vec::new()
        }
        Msg::IncludeCfdToggled(include) => {
            state.set_include_cfd(include);
            Vec::new()
        }
        Msg::ExistingModelChosen(model) => {
            state.set_existing_model(model);
            Vec::new()
        }
        Msg::NextClicked => {
            state.navigate(true);
            Vec::new()
        }
        Msg::PrevClicked => {
            state.navigate(false);
            Vec::new()
        }
        Msg::SubmitClicked => state.request_submit(),
        Msg::PromptAnswered(confirmed) => state.answer_prompt(confirmed),
        Msg::WizardCancelled => {
            state.cancel_wizard();
            Vec::new()
        }
        Msg::SubmissionProgress { submission, event } => {
            state.apply_submission_progress(submission, event);
            Vec::new()
        }
        Msg::SubmissionFinished {
            submission,
            result,
            at,
        } => {
            state.apply_submission_finished(submission, result, at);
            Vec::new()
        }
        Msg::RefreshJobsClicked => vec![Effect::FetchJobList],
        Msg::JobsListed(result) => {
            state.apply_job_list(result);
            Vec::new()
        }
        Msg::PollTick => state.poll_tick(),
        Msg::JobStatusFetched { job_id, result } => {
            state.apply_job_status(job_id, result);
            Vec::new()
        }
        Msg::JobSelected(job_id) => {
            state.select_job(&job_id);
            Vec::new()
        }
        Msg::TrackJob { job_id, job_type } => {
            state.track_job(job_id, job_type);
            Vec::new()
        }
        Msg::StopTrackingClicked(job_id) => {
            state.stop_tracking(&job_id);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
