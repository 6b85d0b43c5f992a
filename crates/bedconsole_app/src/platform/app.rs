use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use bedconsole_core::{
    update, AppState, EditView, FieldEdit, JobId, JobStatus, JobType, Msg, PipelineMode,
    PollState, Prompt, SubmissionStatus,
};
use clap::Parser;
use engine_logging::{engine_info, engine_warn};

use super::cli::{Cli, Command};
use super::config::AppConfig;
use super::effects::EffectRunner;
use super::ui::render::{self, Renderer};
use super::{logging, parameters};

const INBOX_WAIT: Duration = Duration::from_millis(20);

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }
    if let Some(interval) = cli.poll_interval_ms {
        config.poll_interval_ms = interval;
    }
    logging::initialize(config.log_destination, engine_logging::default_level());

    let settings = config.backend_settings()?;
    engine_info!("bedconsole starting against {}", settings.base_url);
    let runner = EffectRunner::new(settings).context("failed to start engine")?;

    // Poll timer; stops when the session drops its receiver.
    let (tick_tx, tick_rx) = mpsc::channel::<Msg>();
    let interval = config.poll_interval();
    thread::spawn(move || {
        while tick_tx.send(Msg::PollTick).is_ok() {
            thread::sleep(interval);
        }
    });

    let mut session = Session::new(
        AppState::with_registry_config(config.registry_config()),
        runner,
        tick_rx,
    );

    match cli.command {
        Command::Submit {
            mode,
            params,
            with_cfd,
            existing_model,
            yes,
            no_follow,
        } => {
            let edits = match params {
                Some(path) => parameters::load(&path)?,
                None => Vec::new(),
            };
            submit(&mut session, mode, edits, with_cfd, existing_model, yes, no_follow)
        }
        Command::Jobs { watch } => list_jobs(&mut session, watch),
        Command::Watch { job_id } => watch_job(&mut session, JobId::new(job_id)),
    }
}

/// Core state plus the engine and terminal it talks to.
struct Session {
    state: AppState,
    runner: EffectRunner,
    renderer: Renderer,
    ticks: Option<mpsc::Receiver<Msg>>,
    listings: usize,
}

impl Session {
    fn new(state: AppState, runner: EffectRunner, ticks: mpsc::Receiver<Msg>) -> Self {
        Self {
            state,
            runner,
            renderer: Renderer::new(),
            ticks: Some(ticks),
            listings: 0,
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        if matches!(msg, Msg::JobsListed(_)) {
            self.listings += 1;
        }
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);
        if self.state.consume_dirty() {
            let view = self.state.view();
            print_lines(self.renderer.render(&view));
        }
    }

    /// Feeds engine events and poll ticks into the core until `done` holds.
    fn pump_until(&mut self, mut done: impl FnMut(&Session) -> bool) {
        while !done(self) {
            for msg in self.runner.drain() {
                self.dispatch(msg);
            }
            if done(self) {
                break;
            }
            let next = match &self.ticks {
                Some(ticks) => ticks.recv_timeout(INBOX_WAIT),
                None => {
                    thread::sleep(INBOX_WAIT);
                    Err(RecvTimeoutError::Timeout)
                }
            };
            match next {
                Ok(msg) => self.dispatch(msg),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.ticks = None,
            }
        }
    }
}

fn submit(
    session: &mut Session,
    mode: PipelineMode,
    edits: Vec<Msg>,
    with_cfd: bool,
    existing_model: Option<String>,
    yes: bool,
    no_follow: bool,
) -> anyhow::Result<()> {
    session.dispatch(Msg::ModeSelected(mode));
    session.dispatch(Msg::IncludeCfdToggled(with_cfd));
    for edit in edits {
        session.dispatch(edit);
        report_edit(session.state.view().wizard.last_edit);
    }
    if existing_model.is_some() {
        session.dispatch(Msg::ExistingModelChosen(existing_model));
    }
    while session.state.wizard().can_go_next() {
        session.dispatch(Msg::NextClicked);
    }
    session.dispatch(Msg::SubmitClicked);
    if let Some(prompt) = session.state.prompt() {
        let answer = yes || ask(prompt)?;
        session.dispatch(Msg::PromptAnswered(answer));
    }

    if no_follow {
        session.pump_until(|session| session.state.pending_submissions() == 0);
    } else {
        session.pump_until(|session| session.state.is_settled());
    }

    match session.state.last_submission() {
        Some(SubmissionStatus::Rejected(errors)) => {
            bail!("submission rejected: {} invalid parameter(s)", errors.len())
        }
        Some(SubmissionStatus::Failed { error, .. }) => bail!("submission failed: {error}"),
        _ => {}
    }
    if !no_follow {
        if let Some(job) = session.state.registry().selected() {
            if job.status() == JobStatus::Failed {
                bail!("job {} failed", job.id());
            }
        }
    }
    Ok(())
}

fn list_jobs(session: &mut Session, watch: bool) -> anyhow::Result<()> {
    session.dispatch(Msg::RefreshJobsClicked);
    session.pump_until(|session| session.listings > 0);
    let view = session.state.view();
    if let Some(error) = view.refresh_error {
        bail!("listing jobs failed: {error}");
    }
    print_lines(render::job_table(&view));

    if watch && !session.state.is_settled() {
        session.pump_until(|session| session.state.is_settled());
        print_lines(render::job_table(&session.state.view()));
    }
    Ok(())
}

fn watch_job(session: &mut Session, job_id: JobId) -> anyhow::Result<()> {
    session.dispatch(Msg::RefreshJobsClicked);
    session.pump_until(|session| session.listings > 0);
    if let Some(error) = session.state.view().refresh_error {
        engine_warn!("Job listing failed, tracking {} directly: {}", job_id, error);
    }
    // Ids missing from the listing are full-pipeline jobs, which only the
    // pipeline status route knows about.
    session.dispatch(Msg::TrackJob {
        job_id: job_id.clone(),
        job_type: JobType::FullPipeline,
    });
    session.pump_until(|session| {
        let finished = session
            .state
            .registry()
            .get(&job_id)
            .map_or(true, |job| job.is_terminal());
        finished || session.state.poller().state(&job_id) != PollState::Polling
    });
    match session.state.registry().get(&job_id) {
        Some(job) if job.status() == JobStatus::Failed => bail!("job {job_id} failed"),
        _ => Ok(()),
    }
}

fn report_edit(edit: Option<EditView>) {
    let Some(edit) = edit else {
        return;
    };
    match edit.outcome {
        FieldEdit::Applied => {}
        FieldEdit::OutOfDomain { reason } => {
            engine_warn!("{}.{} out of range: {}", edit.section, edit.field, reason);
            eprintln!("warning: {}.{}: {reason}", edit.section, edit.field);
        }
        FieldEdit::Retained => {
            engine_warn!("{}.{} kept its previous value", edit.section, edit.field);
            eprintln!(
                "warning: {}.{}: value not understood, previous value kept",
                edit.section, edit.field
            );
        }
    }
}

fn ask(prompt: Prompt) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt.question());
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}
