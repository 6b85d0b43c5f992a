use std::sync::Once;

use bedconsole_core::{
    update, AppState, Effect, FailureKind, JobId, JobRegistry, JobSnapshot, JobStatus, JobType,
    JobUpdate, Msg, PipelineMode, PollState, RegistryConfig, RequestError, StatusEndpoint,
    SubmissionOutput,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn snapshot(id: &str, status: JobStatus, progress: u8, logs: &[&str]) -> JobSnapshot {
    let mut snapshot = JobSnapshot::new(JobId::new(id), status, progress);
    snapshot.logs = logs.iter().map(|line| line.to_string()).collect();
    snapshot
}

/// Walks a full_pipeline submission up to the backend accepting `job_id`.
fn accepted_full_pipeline(job_id: &str) -> AppState {
    let (mut state, _) = update(AppState::new(), Msg::ModeSelected(PipelineMode::FullPipeline));
    while state.view().wizard.can_go_next {
        state = update(state, Msg::NextClicked).0;
    }
    let (state, _) = update(state, Msg::SubmitClicked);
    let (state, effects) = update(state, Msg::PromptAnswered(true));
    let submission = match effects.as_slice() {
        [Effect::RunSubmission { submission, .. }] => *submission,
        other => panic!("unexpected effects {other:?}"),
    };
    update(
        state,
        Msg::SubmissionFinished {
            submission,
            result: Ok(SubmissionOutput::Accepted {
                job_id: JobId::new(job_id),
            }),
            at: None,
        },
    )
    .0
}

fn status(state: AppState, id: &str, result: Result<JobSnapshot, RequestError>) -> AppState {
    update(
        state,
        Msg::JobStatusFetched {
            job_id: JobId::new(id),
            result,
        },
    )
    .0
}

#[test]
fn full_pipeline_job_is_polled_until_completion() {
    init_logging();
    let state = accepted_full_pipeline("abc");
    let id = JobId::new("abc");

    // t=0
    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchJobStatus {
            job_id: id.clone(),
            endpoint: StatusEndpoint::Pipeline,
        }]
    );
    let state = status(
        state,
        "abc",
        Ok(snapshot("abc", JobStatus::Running, 45, &["mesh ready"])),
    );
    assert_eq!(state.registry().get(&id).unwrap().progress(), 45);

    // t=6
    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(effects.len(), 1);
    let mut done = snapshot(
        "abc",
        JobStatus::Completed,
        100,
        &["mesh ready", "solver converged"],
    );
    done.output_files = vec!["output/simulations/abc/case".to_string()];
    let state = status(state, "abc", Ok(done));

    let job = state.registry().get(&id).unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.output_files(), ["output/simulations/abc/case".to_string()]);
    assert_eq!(state.poller().state(&id), PollState::Stopped);
    assert!(state.is_settled());

    // t=40: nothing left to poll.
    let (_, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
}

#[test]
fn one_tick_fans_out_to_every_polling_job() {
    init_logging();
    let state = AppState::new();
    let (state, _) = update(
        state,
        Msg::JobsListed(Ok(vec![
            {
                let mut job = snapshot("sim-1", JobStatus::Meshing, 20, &[]);
                job.job_type = Some(JobType::Simulation);
                job
            },
            {
                let mut job = snapshot("pipe-1", JobStatus::Running, 60, &[]);
                job.job_type = Some(JobType::FullPipeline);
                job
            },
            snapshot("done-1", JobStatus::Completed, 100, &[]),
        ])),
    );
    assert_eq!(state.registry().len(), 3);
    assert_eq!(state.poller().active_count(), 2);

    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![
            Effect::FetchJobStatus {
                job_id: JobId::new("pipe-1"),
                endpoint: StatusEndpoint::Pipeline,
            },
            Effect::FetchJobStatus {
                job_id: JobId::new("sim-1"),
                endpoint: StatusEndpoint::Generic,
            },
        ]
    );

    let pipe_before = state.registry().get(&JobId::new("pipe-1")).unwrap().clone();
    let state = status(
        state,
        "sim-1",
        Ok(snapshot("sim-1", JobStatus::Failed, 20, &[])),
    );
    assert_eq!(state.poller().active_count(), 1);
    let job = state.registry().get(&JobId::new("sim-1")).unwrap();
    assert_eq!(job.progress(), 20);
    assert!(job.error_message().is_some());

    // Next tick: only the job still running is fetched.
    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchJobStatus {
            job_id: JobId::new("pipe-1"),
            endpoint: StatusEndpoint::Pipeline,
        }]
    );
    assert_eq!(state.poller().state(&JobId::new("sim-1")), PollState::Stopped);
    assert_eq!(state.poller().state(&JobId::new("pipe-1")), PollState::Polling);
    assert_eq!(
        state.registry().get(&JobId::new("pipe-1")).unwrap(),
        &pipe_before
    );
    assert_eq!(
        state.registry().get(&JobId::new("sim-1")).unwrap().status(),
        JobStatus::Failed
    );
}

#[test]
fn responses_for_untracked_or_mismatched_jobs_are_discarded() {
    init_logging();
    let state = accepted_full_pipeline("abc");
    let before = state.registry().clone();

    let state = status(
        state,
        "abc",
        Ok(snapshot("other", JobStatus::Running, 50, &[])),
    );
    assert_eq!(state.registry(), &before);

    let (state, _) = update(state, Msg::StopTrackingClicked(JobId::new("abc")));
    assert_eq!(state.poller().state(&JobId::new("abc")), PollState::Stopped);
    let state = status(
        state,
        "abc",
        Ok(snapshot("abc", JobStatus::Running, 80, &[])),
    );
    assert_eq!(state.registry(), &before);
}

#[test]
fn transient_errors_keep_polling_and_missing_jobs_fail() {
    init_logging();
    let state = accepted_full_pipeline("abc");
    let id = JobId::new("abc");

    let state = status(
        state,
        "abc",
        Err(RequestError::new(FailureKind::HttpStatus(503), "busy")),
    );
    let state = status(
        state,
        "abc",
        Err(RequestError::new(FailureKind::Timeout, "no answer")),
    );
    assert_eq!(state.poller().state(&id), PollState::Polling);
    assert_eq!(state.registry().get(&id).unwrap().status(), JobStatus::Queued);
    let view = state.view();
    let detail = view.selected.unwrap();
    assert_eq!(detail.poll_errors, 2);

    let state = status(
        state,
        "abc",
        Ok(snapshot("abc", JobStatus::Preparing, 5, &[])),
    );
    assert_eq!(state.poller().track(&id).unwrap().consecutive_errors, 0);

    let state = status(
        state,
        "abc",
        Err(RequestError::new(FailureKind::HttpStatus(404), "Job not found")),
    );
    let job = state.registry().get(&id).unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert!(job.error_message().unwrap().contains("not found on backend"));
    assert_eq!(job.progress(), 5);
    assert_eq!(state.poller().state(&id), PollState::Stopped);
}

#[test]
fn merge_result_does_not_depend_on_arrival_order() {
    init_logging();
    let updates = [
        snapshot("j", JobStatus::Preparing, 10, &["a"]),
        snapshot("j", JobStatus::Running, 45, &["a", "b"]),
        snapshot("j", JobStatus::Completed, 100, &["a", "b", "c"]),
    ];
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    let mut results = Vec::new();
    for order in orders {
        let mut registry = JobRegistry::default();
        registry.apply(JobUpdate::Register(bedconsole_core::Job::queued(
            JobId::new("j"),
            JobType::Simulation,
        )));
        for index in order {
            registry.apply(JobUpdate::Remote(updates[index].clone()));
        }
        results.push(registry.get(&JobId::new("j")).unwrap().clone());
    }
    for job in &results {
        assert_eq!(job, &results[0]);
    }
    assert_eq!(results[0].status(), JobStatus::Completed);
    assert_eq!(results[0].logs().len(), 3);
}

#[test]
fn progress_never_goes_backwards() {
    init_logging();
    let state = accepted_full_pipeline("abc");
    let id = JobId::new("abc");
    let mut seen = Vec::new();
    let mut state = state;
    for (job_status, progress) in [
        (JobStatus::Running, 40),
        (JobStatus::Meshing, 20),
        (JobStatus::Running, 60),
        (JobStatus::Running, 55),
    ] {
        state = status(state, "abc", Ok(snapshot("abc", job_status, progress, &[])));
        seen.push(state.registry().get(&id).unwrap().progress());
    }
    assert_eq!(seen, vec![40, 40, 60, 60]);
}

#[test]
fn listing_never_polls_local_jobs_and_reports_errors() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::RefreshJobsClicked);
    assert_eq!(effects, vec![Effect::FetchJobList]);

    let (state, _) = update(
        state,
        Msg::JobsListed(Err(RequestError::new(FailureKind::Network, "refused"))),
    );
    assert!(state.view().refresh_error.is_some());

    let (state, _) = update(
        state,
        Msg::JobsListed(Ok(vec![snapshot("local-3", JobStatus::Running, 10, &[])])),
    );
    assert_eq!(state.poller().state(&JobId::new("local-3")), PollState::Idle);
    assert!(state.view().refresh_error.is_none());

    let (state, _) = update(state, Msg::JobSelected(JobId::new("local-3")));
    assert_eq!(state.view().selected.unwrap().job_id, JobId::new("local-3"));
}

fn metadata(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[test]
fn listed_queued_job_keeps_metadata_and_timestamps() {
    init_logging();
    let mut queued = snapshot("gen-1", JobStatus::Queued, 0, &[]);
    queued.job_type = Some(JobType::GenerateModel);
    queued.metadata = Some(metadata(json!({
        "json_file": "output/beds/bed_1.json",
        "open_blender": false,
    })));
    queued.created_at = Some("2026-03-01T10:00:00".to_string());
    queued.updated_at = Some("2026-03-01T10:00:01".to_string());

    let (state, _) = update(AppState::new(), Msg::JobsListed(Ok(vec![queued])));

    let id = JobId::new("gen-1");
    let job = state.registry().get(&id).unwrap();
    assert_eq!(job.job_type(), JobType::GenerateModel);
    assert_eq!(
        job.metadata().get("json_file"),
        Some(&json!("output/beds/bed_1.json"))
    );
    assert_eq!(job.created_at(), Some("2026-03-01T10:00:00"));
    assert_eq!(job.updated_at(), Some("2026-03-01T10:00:01"));
    assert_eq!(state.poller().state(&id), PollState::Polling);
}

#[test]
fn outputs_at_unchanged_progress_are_merged() {
    init_logging();
    let state = accepted_full_pipeline("abc");
    let id = JobId::new("abc");
    let mut running = snapshot("abc", JobStatus::Running, 75, &[]);
    running.updated_at = Some("2026-03-01T10:05:00".to_string());
    let mut state = status(state, "abc", Ok(running));
    assert!(state.consume_dirty());

    let mut same_step = snapshot("abc", JobStatus::Running, 75, &[]);
    same_step.output_files = vec!["output/cases/bed_1".to_string()];
    same_step.metadata = Some(metadata(json!({ "case_dir": "output/cases/bed_1" })));
    same_step.updated_at = Some("2026-03-01T10:05:30".to_string());
    let mut state = status(state, "abc", Ok(same_step.clone()));
    assert!(state.consume_dirty());

    let job = state.registry().get(&id).unwrap();
    assert_eq!(job.progress(), 75);
    assert_eq!(job.output_files(), ["output/cases/bed_1".to_string()]);
    assert_eq!(
        job.metadata().get("case_dir"),
        Some(&json!("output/cases/bed_1"))
    );
    assert_eq!(job.updated_at(), Some("2026-03-01T10:05:30"));

    // Repeating the same answer changes nothing.
    let before = state.registry().clone();
    let mut state = status(state, "abc", Ok(same_step));
    assert_eq!(state.registry(), &before);
    assert!(!state.consume_dirty());
}

#[test]
fn unlisted_pipeline_job_is_tracked_by_id() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        Msg::JobsListed(Ok(vec![snapshot("sim-1", JobStatus::Completed, 100, &[])])),
    );
    let id = JobId::new("pipe-9");
    assert!(!state.registry().contains(&id));

    let (state, _) = update(
        state,
        Msg::TrackJob {
            job_id: id.clone(),
            job_type: JobType::FullPipeline,
        },
    );
    assert_eq!(state.registry().get(&id).unwrap().status(), JobStatus::Queued);
    assert_eq!(state.registry().selected_id(), Some(&id));
    assert_eq!(state.poller().state(&id), PollState::Polling);

    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchJobStatus {
            job_id: id.clone(),
            endpoint: StatusEndpoint::Pipeline,
        }]
    );

    let state = status(
        state,
        "pipe-9",
        Ok(snapshot("pipe-9", JobStatus::Running, 30, &[])),
    );
    assert_eq!(state.registry().get(&id).unwrap().progress(), 30);

    // Tracking a finished job only selects it.
    let (state, _) = update(
        state,
        Msg::TrackJob {
            job_id: JobId::new("sim-1"),
            job_type: JobType::FullPipeline,
        },
    );
    assert_eq!(state.registry().selected_id(), Some(&JobId::new("sim-1")));
    assert_eq!(state.poller().state(&JobId::new("sim-1")), PollState::Idle);
}

#[test]
fn evicted_jobs_lose_their_poll_track() {
    init_logging();
    let state = AppState::with_registry_config(RegistryConfig {
        max_finished_jobs: Some(1),
    });
    let (state, _) = update(
        state,
        Msg::JobsListed(Ok(vec![
            snapshot("a", JobStatus::Running, 10, &[]),
            snapshot("b", JobStatus::Running, 10, &[]),
        ])),
    );
    assert_eq!(state.poller().active_count(), 2);

    let state = status(state, "a", Ok(snapshot("a", JobStatus::Completed, 100, &[])));
    assert_eq!(state.poller().state(&JobId::new("a")), PollState::Stopped);

    let state = status(state, "b", Ok(snapshot("b", JobStatus::Completed, 100, &[])));
    assert!(!state.registry().contains(&JobId::new("a")));
    assert!(state.poller().track(&JobId::new("a")).is_none());
    assert_eq!(state.poller().state(&JobId::new("b")), PollState::Stopped);
}
