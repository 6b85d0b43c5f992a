use bedconsole_core::{
    FailureKind, JobId, JobStatus, JobType, ParameterDocument, StatusEndpoint,
};
use bedconsole_engine::{Backend, BackendSettings, ModelGeneration, ReqwestBackend};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> ReqwestBackend {
    let settings = BackendSettings::with_base_url(&format!("{}/api", server.uri())).unwrap();
    ReqwestBackend::new(&settings).unwrap()
}

#[tokio::test]
async fn compile_posts_parameters_and_reads_file_references() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bed/compile"))
        .and(body_partial_json(json!({
            "parameters": { "bed": { "diameter": 0.05 }, "export": { "formats": ["stl_binary", "blend"] } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "bed_file": "output/bed_1.bed",
            "json_file": "output/bed_1.bed.json",
            "message": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let compiled = backend_for(&server)
        .compile(&ParameterDocument::default())
        .await
        .expect("compile ok");
    assert_eq!(compiled.bed_file, "output/bed_1.bed");
    assert_eq!(compiled.json_file, "output/bed_1.bed.json");
}

#[tokio::test]
async fn model_generation_answers_ready_or_queued() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/model/generate"))
        .and(body_partial_json(json!({ "json_file": "a.json", "open_viewer": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model_path": "output/models/a.blend",
            "exported_formats": ["blend", "stl"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/model/generate"))
        .and(body_partial_json(json!({ "json_file": "b.json" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "gen-7",
            "status": "queued",
            "message": "started"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    assert_eq!(
        backend.generate_model("a.json", true).await.unwrap(),
        ModelGeneration::Ready {
            model_path: "output/models/a.blend".to_string(),
            exported_formats: vec!["blend".to_string(), "stl".to_string()],
        }
    );
    assert_eq!(
        backend.generate_model("b.json", false).await.unwrap(),
        ModelGeneration::Queued {
            job_id: JobId::new("gen-7")
        }
    );
}

#[tokio::test]
async fn job_status_reads_the_route_for_its_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pipeline/job/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "abc",
            "job_type": "full_pipeline",
            "status": "running",
            "progress": 45,
            "logs": ["mesh ready"],
            "output_files": [],
            "metadata": { "case": "bed_1" },
            "created_at": "2026-01-01T10:00:00",
            "updated_at": "2026-01-01T10:00:06"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/job/sim-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "simulation_id": "sim-1",
            "status": "error",
            "progress": 30,
            "error": "snappyHexMesh failed"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let pipeline = backend
        .job_status(StatusEndpoint::Pipeline, &JobId::new("abc"))
        .await
        .unwrap();
    assert_eq!(pipeline.job_type, Some(JobType::FullPipeline));
    assert_eq!(pipeline.status, JobStatus::Running);
    assert_eq!(pipeline.progress, 45);
    assert_eq!(pipeline.updated_at.as_deref(), Some("2026-01-01T10:00:06"));

    let generic = backend
        .job_status(StatusEndpoint::Generic, &JobId::new("sim-1"))
        .await
        .unwrap();
    assert_eq!(generic.job_id, JobId::new("sim-1"));
    assert_eq!(generic.status, JobStatus::Failed);
    assert_eq!(generic.error_message.as_deref(), Some("snappyHexMesh failed"));
}

#[tokio::test]
async fn http_errors_carry_status_and_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "job not found" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>", "text/html"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend
        .job_status(StatusEndpoint::Generic, &JobId::new("gone"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert_eq!(err.message, "job not found");
    assert!(err.kind.is_job_gone());

    let err = backend.list_jobs().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Decode);
    assert!(err.kind.is_transient());
}

#[tokio::test]
async fn full_pipeline_sends_sections_with_null_cfd() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pipeline/full-simulation"))
        .and(body_partial_json(json!({ "cfd": null, "packing": { "method": "rigid_body" } })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "job_id": "9f1c", "status": "queued", "message": "ok" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let job_id = backend_for(&server)
        .start_full_pipeline(&ParameterDocument::default())
        .await
        .unwrap();
    assert_eq!(job_id, JobId::new("9f1c"));
}

#[tokio::test]
async fn unreachable_backend_is_a_network_failure() {
    let settings = BackendSettings::with_base_url("http://127.0.0.1:9/api").unwrap();
    let backend = ReqwestBackend::new(&settings).unwrap();
    let err = backend.list_jobs().await.unwrap_err();
    assert!(matches!(err.kind, FailureKind::Network | FailureKind::Timeout));
}
