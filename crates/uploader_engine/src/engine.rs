use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc as async_mpsc;
use tokio::task::JoinHandle;
use uploader_core::{JobId, SessionId, UploadRequest};
use uploader_logging::{uploader_debug, uploader_info, uploader_warn};

use crate::client::ProgressSink;
use crate::poller::{PollHandle, PollSettings};
use crate::{EngineError, EngineEvent, JobApi};

enum EngineCommand {
    Submit {
        session: SessionId,
        request: UploadRequest,
    },
    AbortUpload {
        session: SessionId,
    },
    StartPolling {
        session: SessionId,
        job_id: JobId,
    },
    StopPolling {
        session: SessionId,
    },
    Cancel {
        session: SessionId,
        job_id: JobId,
    },
    Shutdown,
}

/// Runs all network work on one dedicated thread with a single-threaded
/// runtime. Dropping the handle stops any poll loop and joins the thread.
pub struct EngineHandle {
    cmd_tx: async_mpsc::UnboundedSender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(api: Arc<dyn JobApi>, settings: PollSettings) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;
        let (cmd_tx, cmd_rx) = async_mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("uploader-engine".to_string())
            .spawn(move || {
                let worker = Worker {
                    api,
                    settings,
                    events: event_tx,
                    poll: None,
                    upload: None,
                };
                runtime.block_on(worker.run(cmd_rx));
            })
            .map_err(EngineError::Thread)?;

        Ok(Self {
            cmd_tx,
            event_rx,
            thread: Some(thread),
        })
    }

    pub fn submit(&self, session: SessionId, request: UploadRequest) {
        self.send(EngineCommand::Submit { session, request });
    }

    pub fn abort_upload(&self, session: SessionId) {
        self.send(EngineCommand::AbortUpload { session });
    }

    pub fn start_polling(&self, session: SessionId, job_id: JobId) {
        self.send(EngineCommand::StartPolling { session, job_id });
    }

    pub fn stop_polling(&self, session: SessionId) {
        self.send(EngineCommand::StopPolling { session });
    }

    pub fn cancel_job(&self, session: SessionId, job_id: JobId) {
        self.send(EngineCommand::Cancel { session, job_id });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            uploader_warn!("engine thread is gone; command dropped");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                uploader_warn!("engine thread panicked");
            }
        }
    }
}

struct Worker {
    api: Arc<dyn JobApi>,
    settings: PollSettings,
    events: mpsc::Sender<EngineEvent>,
    /// At most one live poll loop.
    poll: Option<PollHandle>,
    upload: Option<(SessionId, JoinHandle<()>)>,
}

impl Worker {
    async fn run(mut self, mut cmd_rx: async_mpsc::UnboundedReceiver<EngineCommand>) {
        while let Some(command) = cmd_rx.recv().await {
            match command {
                EngineCommand::Submit { session, request } => self.submit(session, request),
                EngineCommand::AbortUpload { session } => {
                    if let Some((active, task)) = self.upload.take() {
                        if active == session {
                            uploader_info!("aborting upload session={}", session);
                            task.abort();
                        } else {
                            self.upload = Some((active, task));
                        }
                    }
                }
                EngineCommand::StartPolling { session, job_id } => {
                    if let Some(previous) = self.poll.take() {
                        uploader_warn!(
                            "replacing poll loop of session={} with session={}",
                            previous.session(),
                            session
                        );
                    }
                    self.poll = Some(PollHandle::spawn(
                        self.api.clone(),
                        session,
                        job_id,
                        self.settings,
                        self.events.clone(),
                    ));
                }
                EngineCommand::StopPolling { session } => {
                    if self.poll.as_ref().map(PollHandle::session) == Some(session) {
                        if let Some(handle) = self.poll.take() {
                            handle.stop();
                        }
                    }
                }
                EngineCommand::Cancel { session, job_id } => self.cancel(session, job_id),
                EngineCommand::Shutdown => break,
            }
        }
        // Dropping the handles here releases the timer and any upload in flight.
        drop(self.poll.take());
        if let Some((_, task)) = self.upload.take() {
            task.abort();
        }
        uploader_debug!("engine worker stopped");
    }

    fn submit(&mut self, session: SessionId, request: UploadRequest) {
        if let Some((previous, task)) = self.upload.take() {
            uploader_warn!("upload of session={} superseded", previous);
            task.abort();
        }
        let api = self.api.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let sink: Arc<dyn ProgressSink> =
                Arc::new(ChannelProgressSink::new(session, events.clone()));
            let result = api.submit_upload(&request, sink).await;
            match &result {
                Ok(job_id) => uploader_info!("upload accepted session={} job={}", session, job_id),
                Err(err) => uploader_warn!("upload failed session={}: {}", session, err),
            }
            let _ = events.send(EngineEvent::UploadFinished { session, result });
        });
        self.upload = Some((session, task));
    }

    fn cancel(&self, session: SessionId, job_id: JobId) {
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.cancel_job(&job_id).await;
            let _ = events.send(EngineEvent::CancelFinished {
                session,
                job_id,
                result,
            });
        });
    }
}

/// Forwards upload byte counts, one event per whole percent.
struct ChannelProgressSink {
    session: SessionId,
    tx: mpsc::Sender<EngineEvent>,
    last_percent: AtomicU8,
}

impl ChannelProgressSink {
    fn new(session: SessionId, tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            session,
            tx,
            last_percent: AtomicU8::new(u8::MAX),
        }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, sent: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (sent.min(total) * 100 / total) as u8
        };
        if self.last_percent.swap(percent, Ordering::Relaxed) == percent {
            return;
        }
        let _ = self.tx.send(EngineEvent::UploadProgress {
            session: self.session,
            sent,
            total,
        });
    }
}
