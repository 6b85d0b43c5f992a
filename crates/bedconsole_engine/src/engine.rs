use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use bedconsole_core::{
    ChainEvent, JobId, ParameterDocument, PipelinePlan, StatusEndpoint, SubmissionId,
};
use engine_logging::{engine_debug, engine_info};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendSettings, ReqwestBackend};
use crate::pipeline::{timestamp, ChainSink, PipelineRunner, WaitSettings};
use crate::{EngineError, EngineEvent};

enum EngineCommand {
    RunSubmission {
        submission: SubmissionId,
        plan: PipelinePlan,
        document: ParameterDocument,
        existing_model: Option<String>,
    },
    FetchJobStatus {
        job_id: JobId,
        endpoint: StatusEndpoint,
    },
    ListJobs,
}

pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    cancel: CancellationToken,
}

impl EngineHandle {
    pub fn new(settings: BackendSettings) -> Result<Self, EngineError> {
        let backend = Arc::new(ReqwestBackend::new(&settings)?);
        Self::with_backend(backend, &settings)
    }

    /// Runs commands against any backend; used with test doubles.
    pub fn with_backend(
        backend: Arc<dyn Backend>,
        settings: &BackendSettings,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;
        let cancel = CancellationToken::new();
        let wait = WaitSettings {
            poll_interval: settings.poll_interval,
            timeout: settings.model_wait_timeout,
        };

        let worker_cancel = cancel.clone();
        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                let backend = backend.clone();
                let event_tx = event_tx.clone();
                let cancel = worker_cancel.clone();
                runtime.spawn(async move {
                    handle_command(backend.as_ref(), wait, cancel, command, event_tx).await;
                });
            }
            engine_debug!("Engine command channel closed");
        });

        engine_info!("Engine started against {}", settings.base_url);
        Ok(Self {
            cmd_tx,
            event_rx,
            cancel,
        })
    }

    pub fn run_submission(
        &self,
        submission: SubmissionId,
        plan: PipelinePlan,
        document: ParameterDocument,
        existing_model: Option<String>,
    ) {
        let _ = self.cmd_tx.send(EngineCommand::RunSubmission {
            submission,
            plan,
            document,
            existing_model,
        });
    }

    pub fn fetch_job_status(&self, job_id: JobId, endpoint: StatusEndpoint) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::FetchJobStatus { job_id, endpoint });
    }

    pub fn list_jobs(&self) {
        let _ = self.cmd_tx.send(EngineCommand::ListJobs);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ChannelChainSink {
    submission: SubmissionId,
    tx: mpsc::Sender<EngineEvent>,
}

impl ChainSink for ChannelChainSink {
    fn emit(&self, event: ChainEvent) {
        let _ = self.tx.send(EngineEvent::SubmissionProgress {
            submission: self.submission,
            event,
        });
    }
}

async fn handle_command(
    backend: &dyn Backend,
    wait: WaitSettings,
    cancel: CancellationToken,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::RunSubmission {
            submission,
            plan,
            document,
            existing_model,
        } => {
            let sink = ChannelChainSink {
                submission,
                tx: event_tx.clone(),
            };
            let runner = PipelineRunner::new(backend, wait, cancel);
            let result = runner
                .run(&plan, &document, existing_model.as_deref(), &sink)
                .await;
            let _ = event_tx.send(EngineEvent::SubmissionFinished {
                submission,
                result,
                at: timestamp(),
            });
        }
        EngineCommand::FetchJobStatus { job_id, endpoint } => {
            let result = backend.job_status(endpoint, &job_id).await;
            let _ = event_tx.send(EngineEvent::JobStatusFetched { job_id, result });
        }
        EngineCommand::ListJobs => {
            let result = backend.list_jobs().await;
            let _ = event_tx.send(EngineEvent::JobsListed(result));
        }
    }
}
