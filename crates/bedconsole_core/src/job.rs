use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque job identifier. Backend ids are kept verbatim; chained submissions
/// get a client-side `local-<n>` id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    const LOCAL_PREFIX: &'static str = "local-";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn local(seq: u64) -> Self {
        Self(format!("{}{seq}", Self::LOCAL_PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with(Self::LOCAL_PREFIX)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Compile,
    GenerateModel,
    Simulation,
    FullPipeline,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Compile => "compile",
            JobType::GenerateModel => "generate_model",
            JobType::Simulation => "simulation",
            JobType::FullPipeline => "full_pipeline",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Preparing,
    Meshing,
    Running,
    Completed,
    #[serde(alias = "error")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the forward lifecycle; used to order same-progress updates.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Preparing => 1,
            JobStatus::Meshing => 2,
            JobStatus::Running => 3,
            JobStatus::Completed | JobStatus::Failed => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Preparing => "preparing",
            JobStatus::Meshing => "meshing",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job as reported by the backend status and listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(alias = "id", alias = "simulation_id")]
    pub job_id: JobId,
    #[serde(default)]
    pub job_type: Option<JobType>,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub output_files: Vec<String>,
    #[serde(default, alias = "error")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl JobSnapshot {
    pub fn new(job_id: JobId, status: JobStatus, progress: u8) -> Self {
        Self {
            job_id,
            job_type: None,
            status,
            progress,
            logs: Vec::new(),
            output_files: Vec::new(),
            error_message: None,
            metadata: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn merge_key(&self) -> MergeKey {
        MergeKey {
            terminal: self.status.is_terminal(),
            progress: self.progress.min(100),
            rank: self.status.rank(),
            log_count: self.logs.len(),
        }
    }
}

/// Ordering used to decide whether an update is newer than what is cached.
/// Field order matters: terminal beats everything, then progress, then status,
/// then how many log lines have been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MergeKey {
    terminal: bool,
    progress: u8,
    rank: u8,
    log_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    Unchanged,
    /// Older than, or regressive against, what is already cached.
    Stale,
}

pub(crate) const MISSING_ERROR_MESSAGE: &str = "job failed without an error message";

/// `errorMessage` is present iff the job failed.
fn failure_message(status: JobStatus, message: Option<String>) -> Option<String> {
    match status {
        JobStatus::Failed => Some(
            message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| MISSING_ERROR_MESSAGE.to_string()),
        ),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    id: JobId,
    job_type: JobType,
    status: JobStatus,
    progress: u8,
    logs: Vec<String>,
    output_files: Vec<String>,
    error_message: Option<String>,
    metadata: Map<String, Value>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl Job {
    pub fn queued(id: JobId, job_type: JobType) -> Self {
        Self {
            id,
            job_type,
            status: JobStatus::Queued,
            progress: 0,
            logs: Vec::new(),
            output_files: Vec::new(),
            error_message: None,
            metadata: Map::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub(crate) fn from_snapshot(snapshot: JobSnapshot, fallback_type: JobType) -> Self {
        let error_message = failure_message(snapshot.status, snapshot.error_message);
        let mut output_files = Vec::new();
        for file in snapshot.output_files {
            if !output_files.contains(&file) {
                output_files.push(file);
            }
        }
        Self {
            id: snapshot.job_id,
            job_type: snapshot.job_type.unwrap_or(fallback_type),
            status: snapshot.status,
            progress: snapshot.progress.min(100),
            logs: snapshot.logs,
            output_files,
            error_message,
            metadata: snapshot.metadata.unwrap_or_default(),
            created_at: snapshot
                .created_at
                .or_else(|| snapshot.updated_at.clone()),
            updated_at: snapshot.updated_at,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn output_files(&self) -> &[String] {
        &self.output_files
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn merge_key(&self) -> MergeKey {
        MergeKey {
            terminal: self.is_terminal(),
            progress: self.progress,
            rank: self.status.rank(),
            log_count: self.logs.len(),
        }
    }

    /// Snapshot of this job with extra log lines, used to express client-side
    /// chain progress as an ordinary update.
    pub(crate) fn advanced(
        &self,
        status: JobStatus,
        progress: u8,
        new_logs: impl IntoIterator<Item = String>,
    ) -> JobSnapshot {
        let mut logs = self.logs.clone();
        logs.extend(new_logs);
        JobSnapshot {
            job_id: self.id.clone(),
            job_type: Some(self.job_type),
            status,
            progress: progress.max(self.progress),
            logs,
            output_files: Vec::new(),
            error_message: None,
            metadata: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Monotonic merge: regressive updates are rejected and a terminal job
    /// never changes again. An update at the same position can still add
    /// output files, metadata and a newer `updated_at`.
    pub(crate) fn merge(&mut self, snapshot: JobSnapshot) -> MergeOutcome {
        if self.is_terminal() {
            return MergeOutcome::Stale;
        }
        let incoming = snapshot.merge_key();
        let current = self.merge_key();
        if incoming < current {
            return MergeOutcome::Stale;
        }

        let mut changed = false;
        if incoming > current {
            self.status = snapshot.status;
            self.progress = self.progress.max(incoming.progress);
            if snapshot.logs.len() > self.logs.len() {
                let seen = self.logs.len();
                self.logs.extend(snapshot.logs.into_iter().skip(seen));
            }
            self.error_message = failure_message(self.status, snapshot.error_message);
            changed = true;
        }
        for file in snapshot.output_files {
            if !self.output_files.contains(&file) {
                self.output_files.push(file);
                changed = true;
            }
        }
        if let Some(metadata) = snapshot.metadata {
            for (key, value) in metadata {
                if self.metadata.get(&key) != Some(&value) {
                    self.metadata.insert(key, value);
                    changed = true;
                }
            }
        }
        if self.created_at.is_none() {
            if let Some(created) = snapshot.created_at.or_else(|| snapshot.updated_at.clone()) {
                self.created_at = Some(created);
                changed = true;
            }
        }
        if let Some(updated) = snapshot.updated_at {
            // RFC 3339 timestamps from one backend order lexicographically.
            let newer = self
                .updated_at
                .as_deref()
                .map_or(true, |current| updated.as_str() > current);
            if newer {
                self.updated_at = Some(updated);
                changed = true;
            }
        }

        if changed {
            MergeOutcome::Applied
        } else {
            MergeOutcome::Unchanged
        }
    }

    pub(crate) fn stamp(&mut self, at: Option<String>) {
        let Some(at) = at else {
            return;
        };
        if self.created_at.is_none() {
            self.created_at = Some(at.clone());
        }
        self.updated_at = Some(at);
    }
}
