use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, RequestBuilder, Response, StatusCode};
use tokio_util::io::ReaderStream;
use uploader_core::{JobId, ProgressSnapshot, UploadRequest};
use uploader_logging::uploader_debug;
use url::Url;

use crate::wire::{ProgressResponse, SubmitResponse};
use crate::{ApiError, AuthContext, FailureKind};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
const UPLOAD_CHUNK_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Applies to the upload request only; large files take a while.
    pub upload_timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{base_url} cannot be used as a base url"),
            ));
        }
        Ok(Self {
            base_url,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(60 * 60),
        })
    }
}

/// Receives byte counts while an upload body is streamed.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, sent: u64, total: u64);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _sent: u64, _total: u64) {}
}

/// The three calls the tracker makes against the video job API.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    async fn submit_upload(
        &self,
        request: &UploadRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<JobId, ApiError>;

    async fn get_progress(&self, job_id: &JobId) -> Result<ProgressSnapshot, ApiError>;

    async fn cancel_job(&self, job_id: &JobId) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestJobApi {
    client: reqwest::Client,
    settings: ClientSettings,
    auth: AuthContext,
}

impl ReqwestJobApi {
    pub fn new(settings: ClientSettings, auth: AuthContext) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            settings,
            auth,
        })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.settings.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(FailureKind::InvalidUrl, "base url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self
            .auth
            .bearer()
            .ok_or_else(|| ApiError::new(FailureKind::Unauthorized, "not signed in"))?;
        Ok(request.bearer_auth(token))
    }
}

#[async_trait::async_trait]
impl JobApi for ReqwestJobApi {
    async fn submit_upload(
        &self,
        request: &UploadRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<JobId, ApiError> {
        let url = self.endpoint(&["videos", "upload"])?;
        let file = tokio::fs::File::open(&request.file.path)
            .await
            .map_err(|err| ApiError::new(FailureKind::Io, err.to_string()))?;
        let total = file
            .metadata()
            .await
            .map_err(|err| ApiError::new(FailureKind::Io, err.to_string()))?
            .len();

        let sent = Arc::new(AtomicU64::new(0));
        let stream = ReaderStream::with_capacity(file, UPLOAD_CHUNK_BYTES).inspect(
            move |chunk: &std::io::Result<Bytes>| {
                if let Ok(bytes) = chunk {
                    let now = sent.fetch_add(bytes.len() as u64, Ordering::Relaxed)
                        + bytes.len() as u64;
                    progress.emit(now, total);
                }
            },
        );
        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(request.file.name.clone())
            .mime_str(&request.media_type)
            .map_err(|err| ApiError::new(FailureKind::InvalidResponse, err.to_string()))?;

        let mut form = Form::new().text("lessonId", request.lesson_id.to_string());
        if let Some(title) = &request.title {
            form = form.text("title", title.clone());
        }
        if let Some(description) = &request.description {
            form = form.text("description", description.clone());
        }
        let form = form.part("file", part);

        uploader_debug!(
            "submitting upload lesson={} file={} bytes={}",
            request.lesson_id,
            request.file.name,
            total
        );
        let response = self
            .authorize(self.client.post(url))?
            .timeout(self.settings.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        let body: SubmitResponse = response.json().await.map_err(map_reqwest_error)?;
        JobId::try_from(body)
            .map_err(|err| ApiError::new(FailureKind::InvalidResponse, err.to_string()))
    }

    async fn get_progress(&self, job_id: &JobId) -> Result<ProgressSnapshot, ApiError> {
        let url = self.endpoint(&["videos", "jobs", job_id.as_str(), "progress"])?;
        let response = self
            .authorize(self.client.get(url))?
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        let body: ProgressResponse = response.json().await.map_err(map_reqwest_error)?;
        ProgressSnapshot::try_from(body)
            .map_err(|err| ApiError::new(FailureKind::InvalidResponse, err.to_string()))
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<(), ApiError> {
        let url = self.endpoint(&["videos", "jobs", job_id.as_str(), "cancel"])?;
        let response = self
            .authorize(self.client.post(url))?
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await?;
        Ok(())
    }
}

/// Maps non-success statuses to errors, keeping the server's message when it sent one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let kind = if status == StatusCode::UNAUTHORIZED {
        FailureKind::Unauthorized
    } else {
        FailureKind::HttpStatus(status.as_u16())
    };
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::new(kind, server_message(&body).unwrap_or_else(|| status.to_string())))
}

fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|msg| !msg.is_empty())
        .map(ToOwned::to_owned)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::InvalidResponse, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
