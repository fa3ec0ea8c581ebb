use std::io::Write;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::NamedTempFile;
use uploader_core::{JobId, JobStatus, SelectedFile, UploadRequest};
use uploader_engine::{
    AuthContext, ClientSettings, FailureKind, JobApi, NoProgress, ProgressSink, ReqwestJobApi,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<(u64, u64)>>,
}

impl ProgressSink for RecordingSink {
    fn emit(&self, sent: u64, total: u64) {
        self.calls.lock().unwrap().push((sent, total));
    }
}

fn api(server: &MockServer, auth: AuthContext) -> ReqwestJobApi {
    let settings = ClientSettings::new(&format!("{}/api", server.uri())).unwrap();
    ReqwestJobApi::new(settings, auth).unwrap()
}

fn video_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

fn request(file: &NamedTempFile, size: u64) -> UploadRequest {
    UploadRequest {
        lesson_id: 42,
        file: SelectedFile::new(file.path(), Some("video/mp4".to_string()), size),
        media_type: "video/mp4".to_string(),
        title: Some("Intro".to_string()),
        description: None,
    }
}

#[tokio::test]
async fn submit_streams_multipart_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/upload"))
        .and(header("authorization", "Bearer secret"))
        .and(body_string_contains("name=\"lessonId\""))
        .and(body_string_contains("name=\"title\""))
        .and(body_string_contains("fake video bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobId": "job-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = b"fake video bytes";
    let file = video_file(payload);
    let sink = Arc::new(RecordingSink::default());
    let client = api(&server, AuthContext::with_token("secret"));

    let job_id = client
        .submit_upload(&request(&file, payload.len() as u64), sink.clone())
        .await
        .expect("upload accepted");

    assert_eq!(job_id, JobId::from("job-1"));
    let calls = sink.calls.lock().unwrap().clone();
    let total = payload.len() as u64;
    assert_eq!(calls.last(), Some(&(total, total)));
}

#[tokio::test]
async fn submit_rejection_keeps_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/upload"))
        .respond_with(
            ResponseTemplate::new(413).set_body_json(json!({ "message": "file too large" })),
        )
        .mount(&server)
        .await;

    let file = video_file(b"data");
    let err = api(&server, AuthContext::with_token("secret"))
        .submit_upload(&request(&file, 4), Arc::new(NoProgress))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(413));
    assert_eq!(err.message, "file too large");
}

#[tokio::test]
async fn progress_decodes_processing_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/jobs/job-1/progress"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "processing",
            "progress": 40,
            "currentStep": "transcode",
            "steps": [{ "name": "transcode", "state": "processing", "progress": 40 }]
        })))
        .mount(&server)
        .await;

    let snapshot = api(&server, AuthContext::with_token("secret"))
        .get_progress(&JobId::from("job-1"))
        .await
        .expect("progress");

    assert_eq!(snapshot.status, JobStatus::Processing);
    assert_eq!(snapshot.percent, 40);
    assert_eq!(snapshot.current_step.as_deref(), Some("transcode"));
    assert_eq!(snapshot.steps.len(), 1);
}

#[tokio::test]
async fn completed_without_result_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/jobs/job-1/progress"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "state": "completed", "progress": 100 })),
        )
        .mount(&server)
        .await;

    let err = api(&server, AuthContext::with_token("secret"))
        .get_progress(&JobId::from("job-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidResponse);
}

#[tokio::test]
async fn unauthorized_status_maps_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/jobs/job-1/progress"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = api(&server, AuthContext::with_token("stale"))
        .get_progress(&JobId::from("job-1"))
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn missing_credential_fails_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = api(&server, AuthContext::signed_out())
        .get_progress(&JobId::from("job-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Unauthorized);
}

#[tokio::test]
async fn cancel_posts_to_job_cancel_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/jobs/job-1/cancel"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    api(&server, AuthContext::with_token("secret"))
        .cancel_job(&JobId::from("job-1"))
        .await
        .expect("cancel accepted");
}
