use std::time::{Duration, Instant};

use bedconsole_core::{
    ChainEvent, JobId, JobStatus, ParameterBuilder, PipelineMode, StatusEndpoint,
    SubmissionOutput,
};
use bedconsole_engine::{BackendSettings, EngineEvent, EngineHandle};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(server: &MockServer) -> BackendSettings {
    let mut settings = BackendSettings::with_base_url(&format!("{}/api", server.uri())).unwrap();
    settings.poll_interval = Duration::from_millis(10);
    settings
}

/// Collects events until `done` matches one or the deadline passes.
fn collect_until(
    engine: &EngineHandle,
    done: impl Fn(&EngineEvent) -> bool,
) -> Vec<EngineEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        if let Some(event) = engine.recv_timeout(Duration::from_millis(50)) {
            let finished = done(&event);
            events.push(event);
            if finished {
                break;
            }
        }
    }
    events
}

#[tokio::test(flavor = "multi_thread")]
async fn submission_progress_and_result_arrive_as_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bed/compile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bed_file": "output/a.bed",
            "json_file": "output/a.bed.json"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/model/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "model_path": "output/a.blend" })),
        )
        .mount(&server)
        .await;

    let engine = EngineHandle::new(settings_for(&server)).unwrap();
    engine.run_submission(
        4,
        PipelineMode::ModelOnly.plan(true),
        ParameterBuilder::new().snapshot(),
        None,
    );

    let events = tokio::task::spawn_blocking(move || {
        collect_until(&engine, |event| {
            matches!(event, EngineEvent::SubmissionFinished { .. })
        })
    })
    .await
    .unwrap();

    let started = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                EngineEvent::SubmissionProgress {
                    submission: 4,
                    event: ChainEvent::StepStarted { .. }
                }
            )
        })
        .count();
    assert_eq!(started, 2);
    match events.last() {
        Some(EngineEvent::SubmissionFinished {
            submission: 4,
            result: Ok(SubmissionOutput::ChainCompleted { outputs }),
            at,
        }) => {
            assert!(outputs.contains(&"output/a.blend".to_string()));
            assert!(!at.is_empty());
        }
        other => panic!("unexpected last event {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn status_and_listing_requests_are_answered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pipeline/job/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "abc",
            "status": "meshing",
            "progress": 30
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "job_id": "abc", "status": "meshing", "progress": 30 },
            { "job_id": "old", "status": "completed", "progress": 100 }
        ])))
        .mount(&server)
        .await;

    let engine = EngineHandle::new(settings_for(&server)).unwrap();
    engine.fetch_job_status(JobId::new("abc"), StatusEndpoint::Pipeline);
    engine.list_jobs();

    let events = tokio::task::spawn_blocking(move || {
        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.extend(collect_until(&engine, |_| true));
        }
        seen
    })
    .await
    .unwrap();

    assert_eq!(events.len(), 2);
    for event in events {
        match event {
            EngineEvent::JobStatusFetched { job_id, result } => {
                assert_eq!(job_id, JobId::new("abc"));
                assert_eq!(result.unwrap().status, JobStatus::Meshing);
            }
            EngineEvent::JobsListed(result) => assert_eq!(result.unwrap().len(), 2),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
