use std::time::Duration;

use bedconsole_core::{
    ChainEvent, CompiledBed, FailureKind, JobId, JobStatus, ParameterDocument, PipelinePlan,
    PipelineStep, RequestError, StatusEndpoint, SubmissionError, SubmissionOutput,
};
use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, CaseRequest};
use crate::ModelGeneration;

/// Receives chain progress while a plan runs.
pub trait ChainSink: Send + Sync {
    fn emit(&self, event: ChainEvent);
}

/// Timing knobs for waiting on backend generation jobs.
#[derive(Debug, Clone, Copy)]
pub struct WaitSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// Everything the chain has produced so far. Later steps read what earlier
/// steps wrote.
#[derive(Debug, Default)]
struct ChainContext {
    compiled: Option<CompiledBed>,
    model_path: Option<String>,
    outputs: Vec<String>,
    accepted: Option<JobId>,
}

impl ChainContext {
    fn json_file(&self) -> Result<&str, RequestError> {
        self.compiled
            .as_ref()
            .map(|compiled| compiled.json_file.as_str())
            .ok_or_else(|| RequestError::new(FailureKind::MissingInput, "no compiled bed"))
    }

    fn record(&mut self, files: &[String]) {
        for file in files {
            if !self.outputs.contains(file) {
                self.outputs.push(file.clone());
            }
        }
    }
}

/// Walks a fixed call plan step by step; the first failing step ends the run.
pub struct PipelineRunner<'a> {
    backend: &'a dyn Backend,
    wait: WaitSettings,
    cancel: CancellationToken,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(backend: &'a dyn Backend, wait: WaitSettings, cancel: CancellationToken) -> Self {
        Self {
            backend,
            wait,
            cancel,
        }
    }

    pub async fn run(
        &self,
        plan: &PipelinePlan,
        document: &ParameterDocument,
        existing_model: Option<&str>,
        sink: &dyn ChainSink,
    ) -> Result<SubmissionOutput, SubmissionError> {
        let total = plan.steps().len();
        let mut ctx = ChainContext {
            model_path: existing_model.map(ToOwned::to_owned),
            ..ChainContext::default()
        };

        for (index, step) in plan.steps().iter().copied().enumerate() {
            sink.emit(ChainEvent::StepStarted {
                index,
                total,
                step,
                at: timestamp(),
            });
            engine_info!("Step {}/{}: {}", index + 1, total, step);

            let produced = self
                .run_step(step, document, &mut ctx, sink)
                .await
                .map_err(|source| {
                    engine_warn!("Step {} failed: {}", step, source);
                    SubmissionError { step, source }
                })?;
            ctx.record(&produced);

            sink.emit(ChainEvent::StepCompleted {
                index,
                total,
                step,
                progress: plan.progress_after(index),
                outputs: produced,
                at: timestamp(),
            });
        }

        if let Some(job_id) = ctx.accepted {
            return Ok(SubmissionOutput::Accepted { job_id });
        }
        if plan.is_compile_only() {
            if let Some(compiled) = ctx.compiled {
                return Ok(SubmissionOutput::Compiled(compiled));
            }
        }
        Ok(SubmissionOutput::ChainCompleted {
            outputs: ctx.outputs,
        })
    }

    async fn run_step(
        &self,
        step: PipelineStep,
        document: &ParameterDocument,
        ctx: &mut ChainContext,
        sink: &dyn ChainSink,
    ) -> Result<Vec<String>, RequestError> {
        match step {
            PipelineStep::Compile => {
                let compiled = self.backend.compile(document).await?;
                let files = vec![compiled.bed_file.clone(), compiled.json_file.clone()];
                ctx.compiled = Some(compiled);
                Ok(files)
            }
            PipelineStep::GenerateModel { open_viewer } => {
                let json_file = ctx.json_file()?.to_string();
                let model_path = match self.backend.generate_model(&json_file, open_viewer).await? {
                    ModelGeneration::Ready {
                        model_path,
                        exported_formats,
                    } => {
                        engine_debug!("Model ready at {} ({:?})", model_path, exported_formats);
                        model_path
                    }
                    ModelGeneration::Queued { job_id } => {
                        sink.emit(ChainEvent::Note {
                            message: format!("waiting for model job {job_id}"),
                            at: timestamp(),
                        });
                        self.wait_for_model(&job_id, sink).await?
                    }
                };
                ctx.model_path = Some(model_path.clone());
                Ok(vec![model_path])
            }
            PipelineStep::CreateCfdCase | PipelineStep::CreateCfdCaseOnly => {
                let json_file = ctx.json_file()?;
                let model_path = ctx.model_path.as_deref();
                let case_name = case_name();
                let request = CaseRequest {
                    json_file,
                    model_path,
                    case_name: &case_name,
                    cfd: document.cfd(),
                };
                let created = if step == PipelineStep::CreateCfdCase {
                    if model_path.is_none() {
                        return Err(RequestError::new(
                            FailureKind::MissingInput,
                            "no model to build the case from",
                        ));
                    }
                    self.backend.create_cfd_case(&request).await?
                } else {
                    self.backend.create_cfd_case_only(&request).await?
                };
                Ok(vec![created.case_dir])
            }
            PipelineStep::FullSimulation => {
                let job_id = self.backend.start_full_pipeline(document).await?;
                engine_info!("Backend accepted full pipeline as job {}", job_id);
                ctx.accepted = Some(job_id);
                Ok(Vec::new())
            }
        }
    }

    /// Polls a generation job until it finishes and returns its model file.
    async fn wait_for_model(
        &self,
        job_id: &JobId,
        sink: &dyn ChainSink,
    ) -> Result<String, RequestError> {
        let deadline = tokio::time::Instant::now() + self.wait.timeout;
        let mut last_status = None;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(RequestError::new(
                        FailureKind::WaitTimeout,
                        format!("stopped waiting for job {job_id}: engine shutting down"),
                    ));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(RequestError::new(
                        FailureKind::WaitTimeout,
                        format!("job {job_id} did not finish within {:?}", self.wait.timeout),
                    ));
                }
                _ = tokio::time::sleep(self.wait.poll_interval) => {}
            }

            let snapshot = match self.backend.job_status(StatusEndpoint::Generic, job_id).await {
                Ok(snapshot) => snapshot,
                Err(err) if err.kind.is_transient() => {
                    engine_debug!("Waiting on job {}: {}", job_id, err);
                    continue;
                }
                Err(err) => return Err(err),
            };

            if last_status != Some(snapshot.status) {
                last_status = Some(snapshot.status);
                sink.emit(ChainEvent::Note {
                    message: format!(
                        "model job {job_id}: {} ({}%)",
                        snapshot.status, snapshot.progress
                    ),
                    at: timestamp(),
                });
            }

            match snapshot.status {
                JobStatus::Completed => {
                    return pick_model_file(&snapshot.output_files).ok_or_else(|| {
                        RequestError::new(
                            FailureKind::MissingInput,
                            format!("job {job_id} completed without a model file"),
                        )
                    });
                }
                JobStatus::Failed => {
                    let message = snapshot
                        .error_message
                        .unwrap_or_else(|| format!("job {job_id} failed"));
                    return Err(RequestError::new(FailureKind::JobFailed, message));
                }
                _ => {}
            }
        }
    }
}

/// Prefers the `.blend` file, otherwise the first output.
fn pick_model_file(outputs: &[String]) -> Option<String> {
    outputs
        .iter()
        .find(|file| file.ends_with(".blend"))
        .or_else(|| outputs.first())
        .cloned()
}

fn case_name() -> String {
    format!("bed_{}", chrono::Utc::now().timestamp_millis())
}

pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_file_prefers_blend_output() {
        let outputs = vec!["out/bed.stl".to_string(), "out/bed.blend".to_string()];
        assert_eq!(pick_model_file(&outputs).as_deref(), Some("out/bed.blend"));
        assert_eq!(
            pick_model_file(&outputs[..1]).as_deref(),
            Some("out/bed.stl")
        );
        assert_eq!(pick_model_file(&[]), None);
    }

    #[test]
    fn case_names_are_prefixed() {
        assert!(case_name().starts_with("bed_"));
    }
}
