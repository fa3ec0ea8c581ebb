use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use uploader_core::{
    FailureCause, JobId, JobResult, LessonId, Msg, Phase, SelectedFile, UploadState,
    UploadViewModel,
};
use uploader_engine::{AuthContext, EngineHandle, ReqwestJobApi, SessionObserver, UploadSession};
use uploader_logging::{uploader_debug, uploader_info};

use crate::config::AppConfig;
use crate::ui;

const EVENT_WAIT: Duration = Duration::from_millis(100);
/// How long a cancel request may take before the process exits anyway.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// What the user asked to upload.
#[derive(Debug, Clone)]
pub struct UploadArgs {
    pub file: PathBuf,
    pub lesson_id: LessonId,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed { job_id: JobId, result: JobResult },
    Failed(String),
    SignedOut,
    Cancelled,
}

/// Prints a fresh frame whenever the rendered lines change.
#[derive(Debug, Default)]
pub struct TerminalObserver {
    last_frame: Vec<String>,
    outcome: Option<Outcome>,
}

impl TerminalObserver {
    fn take_outcome(&mut self) -> Option<Outcome> {
        self.outcome.take()
    }
}

impl SessionObserver for TerminalObserver {
    fn on_completed(&mut self, job_id: &JobId, result: &JobResult) {
        self.outcome = Some(Outcome::Completed {
            job_id: job_id.clone(),
            result: result.clone(),
        });
    }

    fn on_failed(&mut self, cause: &FailureCause) {
        self.outcome = Some(Outcome::Failed(cause.to_string()));
    }

    fn on_signed_out(&mut self) {
        self.outcome = Some(Outcome::SignedOut);
    }

    fn on_render(&mut self, view: &UploadViewModel) {
        let frame = ui::render::render(view);
        if frame == self.last_frame {
            return;
        }
        let stamp = chrono::Local::now().format("%H:%M:%S");
        for line in &frame {
            println!("[{stamp}] {line}");
        }
        self.last_frame = frame;
    }
}

/// Uploads one file and follows its processing job to the end.
pub fn run(config: &AppConfig, auth: AuthContext, args: UploadArgs) -> anyhow::Result<Outcome> {
    if !auth.is_signed_in() {
        bail!("no credential: pass --token or set {}", crate::config::ENV_TOKEN);
    }
    let size = std::fs::metadata(&args.file)
        .with_context(|| format!("cannot read {}", args.file.display()))?
        .len();

    let api = ReqwestJobApi::new(config.client_settings()?, auth.clone())?;
    let engine = EngineHandle::new(Arc::new(api), config.poll_settings())?;
    let state = UploadState::new(config.policy(), config.max_poll_attempts);
    let mut session = UploadSession::new(state, engine, auth, TerminalObserver::default());

    session.dispatch(Msg::FileSelected(SelectedFile::new(&args.file, None, size)));
    session.dispatch(Msg::LessonSelected(args.lesson_id));
    if let Some(title) = args.title {
        session.dispatch(Msg::TitleChanged(title));
    }
    if let Some(description) = args.description {
        session.dispatch(Msg::DescriptionChanged(description));
    }
    session.dispatch(Msg::SubmitClicked);

    if session.state().phase() != Phase::Uploading {
        let view = session.state().view();
        let reason = view
            .validation_error
            .or(view.error)
            .unwrap_or_else(|| "upload was not started".to_string());
        bail!("{reason}");
    }

    println!("Type 'c' and Enter to cancel.");
    let cancel_rx = spawn_cancel_listener();
    while session.state().phase().is_busy() {
        if cancel_rx.try_recv().is_ok() {
            uploader_info!("cancel requested from terminal");
            session.dispatch(Msg::CancelClicked);
            session.finish_cancels(CANCEL_GRACE);
            break;
        }
        session.wait_event(EVENT_WAIT);
    }

    let outcome = session.observer_mut().take_outcome();
    Ok(match (outcome, session.state().phase()) {
        (Some(outcome), _) => outcome,
        (None, Phase::Idle) => Outcome::Cancelled,
        (None, phase) => Outcome::Failed(format!("session ended while {phase:?}")),
    })
}

/// Sends `()` each time a line reading `c` arrives on stdin.
fn spawn_cancel_listener() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if is_cancel_command(&line) && tx.send(()).is_err() {
                break;
            }
        }
        uploader_debug!("stdin closed");
    });
    rx
}

fn is_cancel_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("c") || line.eq_ignore_ascii_case("cancel")
}
