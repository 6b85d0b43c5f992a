use std::fmt;

use crate::PipelineStep;

/// Classification of a failed backend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    /// The backend reported a failed job the pipeline was waiting on.
    JobFailed,
    WaitTimeout,
    /// A step ran without the output of the step it depends on.
    MissingInput,
}

impl FailureKind {
    /// Worth another attempt on the next poll tick.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Network | FailureKind::Decode => true,
            FailureKind::HttpStatus(code) => !matches!(code, 404 | 410),
            _ => false,
        }
    }

    /// The backend no longer knows the job.
    pub fn is_job_gone(&self) -> bool {
        matches!(self, FailureKind::HttpStatus(404 | 410))
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "unreadable response"),
            FailureKind::JobFailed => write!(f, "backend job failed"),
            FailureKind::WaitTimeout => write!(f, "gave up waiting for backend job"),
            FailureKind::MissingInput => write!(f, "missing input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RequestError {
    pub kind: FailureKind,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A submission chain stopped at `step`; later steps were not attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct SubmissionError {
    pub step: PipelineStep,
    #[source]
    pub source: RequestError,
}
