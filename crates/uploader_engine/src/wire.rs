//! JSON shapes of the video job endpoints and their mapping onto core types.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uploader_core::{
    clamp_percent, JobId, JobResult, JobStatus, ProgressSnapshot, StepProgress, StepState,
};

const DEFAULT_FAILURE_REASON: &str = "processing failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireState {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStep {
    pub name: String,
    pub state: WireState,
    #[serde(default)]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResult {
    pub video_id: String,
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub state: WireState,
    /// Absent and `null` both read as zero.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub steps: Vec<WireStep>,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub result: Option<WireResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("job id is empty")]
    EmptyJobId,
    #[error("completed job without a result payload")]
    MissingResult,
}

impl TryFrom<SubmitResponse> for JobId {
    type Error = WireError;

    fn try_from(value: SubmitResponse) -> Result<Self, Self::Error> {
        let id = value.job_id.trim();
        if id.is_empty() {
            return Err(WireError::EmptyJobId);
        }
        Ok(JobId::new(id))
    }
}

impl TryFrom<ProgressResponse> for ProgressSnapshot {
    type Error = WireError;

    fn try_from(value: ProgressResponse) -> Result<Self, Self::Error> {
        let status = match value.state {
            WireState::Pending => JobStatus::Pending,
            WireState::Processing => JobStatus::Processing,
            WireState::Completed => {
                let result = value.result.ok_or(WireError::MissingResult)?;
                JobStatus::Completed(result.into())
            }
            WireState::Failed => JobStatus::Failed(
                value
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()),
            ),
        };

        Ok(ProgressSnapshot {
            status,
            percent: clamp_percent(value.progress.unwrap_or(0.0)),
            current_step: value.current_step,
            steps: value.steps.into_iter().map(Into::into).collect(),
            eta: value.eta,
        })
    }
}

impl From<WireStep> for StepProgress {
    fn from(step: WireStep) -> Self {
        StepProgress {
            name: step.name,
            state: step.state.into(),
            percent: clamp_percent(step.progress.unwrap_or(0.0)),
        }
    }
}

impl From<WireState> for StepState {
    fn from(state: WireState) -> Self {
        match state {
            WireState::Pending => StepState::Pending,
            WireState::Processing => StepState::Processing,
            WireState::Completed => StepState::Completed,
            WireState::Failed => StepState::Failed,
        }
    }
}

impl From<WireResult> for JobResult {
    fn from(result: WireResult) -> Self {
        JobResult {
            video_id: result.video_id,
            urls: result.urls,
            duration_secs: result.duration,
            file_size: result.file_size,
            thumbnail_url: result.thumbnail_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Result<ProgressSnapshot, String> {
        let response: ProgressResponse =
            serde_json::from_value(value).map_err(|e| e.to_string())?;
        ProgressSnapshot::try_from(response).map_err(|e| e.to_string())
    }

    #[test]
    fn processing_payload_maps_steps_and_clamps() {
        let snapshot = decode(json!({
            "state": "processing",
            "progress": 40.4,
            "currentStep": "transcoding",
            "steps": [
                { "name": "upload", "state": "completed", "progress": 100 },
                { "name": "transcode", "state": "processing", "progress": 180 }
            ],
            "eta": "3 min"
        }))
        .unwrap();

        assert_eq!(snapshot.status, JobStatus::Processing);
        assert_eq!(snapshot.percent, 40);
        assert_eq!(snapshot.steps[0].state, StepState::Completed);
        assert_eq!(snapshot.steps[1].percent, 100);
        assert_eq!(snapshot.eta.as_deref(), Some("3 min"));
    }

    #[test]
    fn completed_requires_result() {
        let err = decode(json!({ "state": "completed", "progress": 100 })).unwrap_err();
        assert_eq!(err, WireError::MissingResult.to_string());

        let snapshot = decode(json!({
            "state": "completed",
            "progress": 100,
            "result": {
                "videoId": "v1",
                "urls": { "720p": "u" },
                "duration": 120,
                "fileSize": 10485760
            }
        }))
        .unwrap();
        let result = snapshot.result().unwrap();
        assert_eq!(result.video_id, "v1");
        assert_eq!(result.urls.get("720p").map(String::as_str), Some("u"));
        assert_eq!(result.file_size, 10_485_760);
    }

    #[test]
    fn failed_without_message_gets_default_reason() {
        let snapshot = decode(json!({ "state": "failed", "error": "" })).unwrap();
        assert_eq!(
            snapshot.status,
            JobStatus::Failed(DEFAULT_FAILURE_REASON.to_string())
        );
    }

    #[test]
    fn null_progress_reads_as_zero() {
        let snapshot = decode(json!({
            "state": "pending",
            "progress": null,
            "steps": [{ "name": "queue", "state": "pending", "progress": null }]
        }))
        .unwrap();
        assert_eq!(snapshot.status, JobStatus::Pending);
        assert_eq!(snapshot.percent, 0);
        assert_eq!(snapshot.steps[0].percent, 0);
    }

    #[test]
    fn unknown_state_is_rejected() {
        assert!(decode(json!({ "state": "exploded" })).is_err());
    }

    #[test]
    fn blank_job_id_is_rejected() {
        let response = SubmitResponse {
            job_id: "  ".to_string(),
        };
        assert_eq!(JobId::try_from(response), Err(WireError::EmptyJobId));
    }
}
