use std::collections::BTreeMap;

use engine_logging::{engine_debug, engine_info};

use crate::job::MISSING_ERROR_MESSAGE;
use crate::{ChainEvent, Job, JobId, JobSnapshot, JobStatus, JobType, MergeOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryConfig {
    /// Keep at most this many completed or failed jobs. `None` keeps every job
    /// for the whole session.
    pub max_finished_jobs: Option<usize>,
}

/// Every change to a registered job goes through [`JobRegistry::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Register(Job),
    Remote(JobSnapshot),
    Chain {
        job_id: JobId,
        event: ChainEvent,
    },
    Finished {
        job_id: JobId,
        outputs: Vec<String>,
        at: Option<String>,
    },
    Failed {
        job_id: JobId,
        message: String,
        at: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    seq: u64,
    job: Job,
}

/// Client-side cache of all known jobs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobRegistry {
    jobs: BTreeMap<JobId, Entry>,
    selected: Option<JobId>,
    next_seq: u64,
    config: RegistryConfig,
    evicted: Vec<JobId>,
}

impl JobRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, job_id: &JobId) -> Option<&Job> {
        self.jobs.get(job_id).map(|entry| &entry.job)
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.contains_key(job_id)
    }

    /// Jobs in ascending id order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values().map(|entry| &entry.job)
    }

    pub fn selected(&self) -> Option<&Job> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    pub fn selected_id(&self) -> Option<&JobId> {
        self.selected.as_ref()
    }

    pub fn select(&mut self, job_id: &JobId) -> bool {
        if self.contains(job_id) {
            self.selected = Some(job_id.clone());
            true
        } else {
            false
        }
    }

    pub fn apply(&mut self, update: JobUpdate) -> MergeOutcome {
        let outcome = match update {
            JobUpdate::Register(job) => {
                if self.contains(job.id()) {
                    MergeOutcome::Unchanged
                } else {
                    engine_info!("Registered job {} ({})", job.id(), job.job_type());
                    self.insert(job);
                    MergeOutcome::Applied
                }
            }
            JobUpdate::Remote(snapshot) => match self.jobs.get_mut(&snapshot.job_id) {
                Some(entry) => entry.job.merge(snapshot),
                None => {
                    let job = Job::from_snapshot(snapshot, JobType::FullPipeline);
                    self.insert(job);
                    MergeOutcome::Applied
                }
            },
            JobUpdate::Chain { job_id, event } => {
                let at = Some(event.at().to_string());
                self.merge_local(&job_id, at, |job| match &event {
                    ChainEvent::StepStarted { index, total, step, .. } => job.advanced(
                        JobStatus::Running,
                        job.progress(),
                        [format!("[{}/{}] {} started", index + 1, total, step)],
                    ),
                    ChainEvent::StepCompleted {
                        index,
                        total,
                        step,
                        progress,
                        outputs,
                        ..
                    } => {
                        let mut lines = vec![format!("[{}/{}] {} done", index + 1, total, step)];
                        lines.extend(outputs.iter().map(|file| format!("  -> {file}")));
                        let mut snapshot = job.advanced(JobStatus::Running, *progress, lines);
                        snapshot.output_files = outputs.clone();
                        snapshot
                    }
                    ChainEvent::Note { message, .. } => {
                        job.advanced(job.status(), job.progress(), [message.clone()])
                    }
                })
            }
            JobUpdate::Finished {
                job_id,
                outputs,
                at,
            } => self.merge_local(&job_id, at, |job| {
                let mut snapshot =
                    job.advanced(JobStatus::Completed, 100, ["pipeline finished".to_string()]);
                snapshot.output_files = outputs;
                snapshot
            }),
            JobUpdate::Failed {
                job_id,
                message,
                at,
            } => self.merge_local(&job_id, at, |job| {
                let mut snapshot =
                    job.advanced(JobStatus::Failed, job.progress(), [format!("error: {message}")]);
                snapshot.error_message = Some(message);
                snapshot
            }),
        };
        if outcome == MergeOutcome::Applied {
            self.enforce_bound();
        }
        outcome
    }

    /// Ids removed by the finished-job bound since the last call.
    pub(crate) fn take_evicted(&mut self) -> Vec<JobId> {
        std::mem::take(&mut self.evicted)
    }

    fn merge_local<F>(&mut self, job_id: &JobId, at: Option<String>, build: F) -> MergeOutcome
    where
        F: FnOnce(&Job) -> JobSnapshot,
    {
        let Some(entry) = self.jobs.get_mut(job_id) else {
            engine_debug!("Dropping update for unknown job {}", job_id);
            return MergeOutcome::Stale;
        };
        let snapshot = build(&entry.job);
        let outcome = entry.job.merge(snapshot);
        if outcome == MergeOutcome::Applied {
            entry.job.stamp(at);
        }
        outcome
    }

    fn insert(&mut self, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.jobs.insert(job.id().clone(), Entry { seq, job });
    }

    fn enforce_bound(&mut self) {
        let Some(limit) = self.config.max_finished_jobs else {
            return;
        };
        let mut finished: Vec<(u64, JobId)> = self
            .jobs
            .iter()
            .filter(|(_, entry)| entry.job.is_terminal())
            .map(|(id, entry)| (entry.seq, id.clone()))
            .collect();
        if finished.len() <= limit {
            return;
        }
        finished.sort();
        let excess = finished.len() - limit;
        for (_, id) in finished.into_iter().take(excess) {
            engine_debug!("Evicting finished job {}", id);
            self.jobs.remove(&id);
            if self.selected.as_ref() == Some(&id) {
                self.selected = None;
            }
            self.evicted.push(id);
        }
    }
}

/// Message stored on a job the backend no longer knows.
pub(crate) fn job_gone_message(detail: &str) -> String {
    if detail.trim().is_empty() {
        "job not found on backend".to_string()
    } else {
        format!("job not found on backend: {detail}")
    }
}
