use std::collections::BTreeMap;
use std::fmt;

/// Local identifier of one upload attempt; bumped on every submission.
pub type SessionId = u64;

pub type LessonId = u64;

/// Opaque job identifier issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepProgress {
    pub name: String,
    pub state: StepState,
    pub percent: u8,
}

/// Output of a finished transcode.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub video_id: String,
    /// Quality label (`"720p"`) to playback URL.
    pub urls: BTreeMap<String, String>,
    pub duration_secs: f64,
    pub file_size: u64,
    pub thumbnail_url: Option<String>,
}

/// Server-reported job state. The result only exists once the job completed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed(JobResult),
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed(_) | JobStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed(_) => "completed",
            JobStatus::Failed(_) => "failed",
        }
    }
}

/// One poll response. Each snapshot replaces the previous one entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub status: JobStatus,
    pub percent: u8,
    pub current_step: Option<String>,
    pub steps: Vec<StepProgress>,
    pub eta: Option<String>,
}

impl ProgressSnapshot {
    pub fn new(status: JobStatus, percent: u8) -> Self {
        Self {
            status,
            percent: percent.min(100),
            current_step: None,
            steps: Vec::new(),
            eta: None,
        }
    }

    pub fn result(&self) -> Option<&JobResult> {
        match &self.status {
            JobStatus::Completed(result) => Some(result),
            _ => None,
        }
    }
}

/// Clamps a server-reported percentage into `0..=100`. NaN maps to 0.
pub fn clamp_percent(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
