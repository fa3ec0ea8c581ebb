use std::sync::{mpsc, Arc};
use std::time::Duration;

use serde_json::json;
use uploader_core::{JobId, JobStatus};
use uploader_engine::{
    AuthContext, ClientSettings, EngineEvent, FailureKind, JobApi, PollHandle, PollSettings,
    ReqwestJobApi,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROGRESS_PATH: &str = "/api/videos/jobs/job-1/progress";

fn fast_settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(20),
    }
}

fn api(server: &MockServer) -> Arc<dyn JobApi> {
    let settings = ClientSettings::new(&format!("{}/api", server.uri())).unwrap();
    Arc::new(ReqwestJobApi::new(settings, AuthContext::with_token("secret")).unwrap())
}

async fn next_event(rx: &mpsc::Receiver<EngineEvent>) -> EngineEvent {
    for _ in 0..200 {
        if let Ok(event) = rx.try_recv() {
            return event;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no engine event within 2s");
}

async fn progress_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == PROGRESS_PATH)
        .count()
}

#[tokio::test(flavor = "multi_thread")]
async fn terminal_snapshot_ends_the_loop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "failed",
            "progress": 10,
            "error": "codec not supported"
        })))
        .mount(&server)
        .await;

    let (tx, rx) = mpsc::channel();
    let handle = PollHandle::spawn(api(&server), 7, JobId::from("job-1"), fast_settings(), tx);

    match next_event(&rx).await {
        EngineEvent::Polled { session, result } => {
            assert_eq!(session, 7);
            assert_eq!(
                result.unwrap().status,
                JobStatus::Failed("codec not supported".to_string())
            );
        }
        other => panic!("unexpected event: {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(handle.is_finished());
    assert_eq!(progress_requests(&server).await, 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_errors_are_reported_and_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "state": "processing", "progress": 55 })),
        )
        .mount(&server)
        .await;

    let (tx, rx) = mpsc::channel();
    let handle = PollHandle::spawn(api(&server), 1, JobId::from("job-1"), fast_settings(), tx);

    match next_event(&rx).await {
        EngineEvent::Polled { result: Err(err), .. } => {
            assert_eq!(err.kind, FailureKind::HttpStatus(503));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match next_event(&rx).await {
        EngineEvent::Polled {
            result: Ok(snapshot),
            ..
        } => assert_eq!(snapshot.percent, 55),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(!handle.is_finished());

    handle.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_stop = progress_requests(&server).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(progress_requests(&server).await, after_stop);
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthorized_ends_the_loop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (tx, rx) = mpsc::channel();
    let handle = PollHandle::spawn(api(&server), 3, JobId::from("job-1"), fast_settings(), tx);

    match next_event(&rx).await {
        EngineEvent::Polled { result: Err(err), .. } => assert!(err.is_unauthorized()),
        other => panic!("unexpected event: {other:?}"),
    }
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(handle.is_finished());
    assert_eq!(progress_requests(&server).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_request_waits_one_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "state": "pending", "progress": 0 })),
        )
        .mount(&server)
        .await;

    let (tx, _rx) = mpsc::channel();
    let settings = PollSettings {
        interval: Duration::from_millis(300),
    };
    let handle = PollHandle::spawn(api(&server), 1, JobId::from("job-1"), settings, tx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(progress_requests(&server).await, 0);
    drop(handle);
}
