use std::collections::BTreeMap;

use crate::{JobId, JobType, RequestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Idle,
    Polling,
    Stopped,
}

/// Which status route a job is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEndpoint {
    /// `/pipeline/job/{id}`
    Pipeline,
    /// `/job/{id}`
    Generic,
}

impl StatusEndpoint {
    pub fn for_job_type(job_type: JobType) -> Self {
        match job_type {
            JobType::FullPipeline => StatusEndpoint::Pipeline,
            _ => StatusEndpoint::Generic,
        }
    }

    /// Route segments under the API base; the job id is the final segment.
    pub fn segments(self) -> &'static [&'static str] {
        match self {
            StatusEndpoint::Pipeline => &["pipeline", "job"],
            StatusEndpoint::Generic => &["job"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTrack {
    pub state: PollState,
    pub endpoint: StatusEndpoint,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
}

/// Per-job polling lifecycle. One shared tick fans out a fetch for every job
/// in `Polling`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobPoller {
    tracks: BTreeMap<JobId, PollTrack>,
}

impl JobPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, job_id: &JobId) -> PollState {
        self.tracks
            .get(job_id)
            .map(|track| track.state)
            .unwrap_or_default()
    }

    pub fn track(&self, job_id: &JobId) -> Option<&PollTrack> {
        self.tracks.get(job_id)
    }

    pub fn is_polling(&self, job_id: &JobId) -> bool {
        self.state(job_id) == PollState::Polling
    }

    pub fn start(&mut self, job_id: JobId, endpoint: StatusEndpoint) {
        let track = self.tracks.entry(job_id).or_insert(PollTrack {
            state: PollState::Idle,
            endpoint,
            consecutive_errors: 0,
            last_error: None,
        });
        track.state = PollState::Polling;
        track.endpoint = endpoint;
    }

    /// Returns false when the job was not being polled.
    pub fn stop(&mut self, job_id: &JobId) -> bool {
        match self.tracks.get_mut(job_id) {
            Some(track) if track.state == PollState::Polling => {
                track.state = PollState::Stopped;
                true
            }
            _ => false,
        }
    }

    /// Drops the track entirely; the job is no longer in the registry.
    pub fn forget(&mut self, job_id: &JobId) -> bool {
        self.tracks.remove(job_id).is_some()
    }

    pub fn due(&self) -> Vec<(JobId, StatusEndpoint)> {
        self.tracks
            .iter()
            .filter(|(_, track)| track.state == PollState::Polling)
            .map(|(id, track)| (id.clone(), track.endpoint))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.tracks
            .values()
            .filter(|track| track.state == PollState::Polling)
            .count()
    }

    pub fn record_success(&mut self, job_id: &JobId) {
        if let Some(track) = self.tracks.get_mut(job_id) {
            track.consecutive_errors = 0;
            track.last_error = None;
        }
    }

    pub fn record_failure(&mut self, job_id: &JobId, error: &RequestError) {
        if let Some(track) = self.tracks.get_mut(job_id) {
            track.consecutive_errors = track.consecutive_errors.saturating_add(1);
            track.last_error = Some(error.to_string());
        }
    }
}
