use bedconsole_core::{Effect, Msg};
use bedconsole_engine::{BackendSettings, EngineError, EngineEvent, EngineHandle};
use engine_logging::{engine_debug, engine_info};

pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(settings: BackendSettings) -> Result<Self, EngineError> {
        Ok(Self {
            engine: EngineHandle::new(settings)?,
        })
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RunSubmission {
                    submission,
                    plan,
                    document,
                    existing_model,
                } => {
                    engine_info!(
                        "RunSubmission submission={} mode={} steps={}",
                        submission,
                        plan.mode(),
                        plan.steps().len()
                    );
                    self.engine
                        .run_submission(submission, plan, document, existing_model);
                }
                Effect::FetchJobStatus { job_id, endpoint } => {
                    engine_debug!("FetchJobStatus job_id={} endpoint={:?}", job_id, endpoint);
                    self.engine.fetch_job_status(job_id, endpoint);
                }
                Effect::FetchJobList => {
                    engine_debug!("FetchJobList");
                    self.engine.list_jobs();
                }
            }
        }
    }

    /// Engine events that arrived since the last call, as core messages.
    pub fn drain(&self) -> Vec<Msg> {
        let mut inbox = Vec::new();
        while let Some(event) = self.engine.try_recv() {
            inbox.push(map_event(event));
        }
        inbox
    }
}

pub fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::SubmissionProgress { submission, event } => {
            Msg::SubmissionProgress { submission, event }
        }
        EngineEvent::SubmissionFinished {
            submission,
            result,
            at,
        } => Msg::SubmissionFinished {
            submission,
            result,
            at: Some(at),
        },
        EngineEvent::JobStatusFetched { job_id, result } => {
            Msg::JobStatusFetched { job_id, result }
        }
        EngineEvent::JobsListed(result) => Msg::JobsListed(result),
    }
}

#[cfg(test)]
mod tests {
    use bedconsole_core::{JobId, JobSnapshot, JobStatus, SubmissionOutput};

    use super::*;

    #[test]
    fn engine_events_map_onto_messages() {
        let msg = map_event(EngineEvent::SubmissionFinished {
            submission: 3,
            result: Ok(SubmissionOutput::Accepted {
                job_id: JobId::new("abc"),
            }),
            at: "2026-01-01T00:00:00+00:00".to_string(),
        });
        assert_eq!(
            msg,
            Msg::SubmissionFinished {
                submission: 3,
                result: Ok(SubmissionOutput::Accepted {
                    job_id: JobId::new("abc"),
                }),
                at: Some("2026-01-01T00:00:00+00:00".to_string()),
            }
        );

        let snapshot = JobSnapshot::new(JobId::new("abc"), JobStatus::Running, 10);
        let msg = map_event(EngineEvent::JobsListed(Ok(vec![snapshot.clone()])));
        assert_eq!(msg, Msg::JobsListed(Ok(vec![snapshot])));
    }
}
