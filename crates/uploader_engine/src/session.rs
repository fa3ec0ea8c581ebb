use std::time::{Duration, Instant};

use uploader_core::{
    update, Effect, FailureCause, JobId, JobResult, Msg, Phase, UploadState, UploadViewModel,
};
use uploader_logging::{uploader_debug, uploader_info, uploader_warn};

use crate::{AuthContext, EngineEvent, EngineHandle};

/// Callbacks fired by an [`UploadSession`].
///
/// `on_completed` and `on_failed` fire at most once per submission.
pub trait SessionObserver {
    fn on_completed(&mut self, job_id: &JobId, result: &JobResult);

    fn on_failed(&mut self, cause: &FailureCause);

    /// The credential was rejected and has been cleared.
    fn on_signed_out(&mut self) {}

    /// State changed; `view` is the fresh projection.
    fn on_render(&mut self, _view: &UploadViewModel) {}
}

/// Drives one uploader: feeds messages through the pure `update`, executes the
/// resulting effects on the engine and turns engine events back into messages.
///
/// Dropping the session tears it down, which stops any live poll loop.
pub struct UploadSession<O: SessionObserver> {
    state: UploadState,
    engine: EngineHandle,
    auth: AuthContext,
    observer: O,
    /// Cancel requests sent whose result has not come back yet.
    pending_cancels: usize,
}

impl<O: SessionObserver> UploadSession<O> {
    pub fn new(state: UploadState, engine: EngineHandle, auth: AuthContext, observer: O) -> Self {
        Self {
            state,
            engine,
            auth,
            observer,
            pending_cancels: 0,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        for effect in effects {
            self.run_effect(effect);
        }
        if self.state.consume_dirty() {
            let view = self.state.view();
            self.observer.on_render(&view);
        }
    }

    /// Stores a fresh credential and clears the logged-out flag.
    pub fn sign_in(&mut self, token: impl Into<String>) {
        self.auth.set_token(token);
        self.dispatch(Msg::SignedIn);
    }

    /// Handles every engine event already queued; returns how many there were.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.engine.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Blocks up to `timeout` for the next engine event, then drains the rest.
    pub fn wait_event(&mut self, timeout: Duration) -> bool {
        match self.engine.recv_timeout(timeout) {
            Some(event) => {
                self.handle_event(event);
                self.pump();
                true
            }
            None => false,
        }
    }

    /// Processes events until the session leaves `Uploading`/`Polling` or
    /// `limit` elapses. Returns the phase reached.
    pub fn run_until_settled(&mut self, limit: Duration) -> Phase {
        let deadline = Instant::now() + limit;
        while self.state.phase().is_busy() {
            let now = Instant::now();
            if now >= deadline {
                uploader_warn!("session still {:?} after {:?}", self.state.phase(), limit);
                break;
            }
            self.wait_event(deadline - now);
        }
        self.state.phase()
    }

    pub fn pending_cancels(&self) -> usize {
        self.pending_cancels
    }

    /// Processes events until every cancel request sent so far has been
    /// answered or `limit` elapses. Returns whether all were answered.
    pub fn finish_cancels(&mut self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while self.pending_cancels > 0 {
            let now = Instant::now();
            if now >= deadline {
                uploader_warn!("{} cancel request(s) unanswered", self.pending_cancels);
                return false;
            }
            self.wait_event(deadline - now);
        }
        true
    }

    fn handle_event(&mut self, event: EngineEvent) {
        let msg = match event {
            EngineEvent::UploadProgress {
                session,
                sent,
                total,
            } => Msg::UploadProgress {
                session,
                sent,
                total,
            },
            EngineEvent::UploadFinished { session, result } => match result {
                Ok(job_id) => Msg::UploadAccepted { session, job_id },
                Err(err) if err.is_unauthorized() => Msg::SessionExpired,
                Err(err) => Msg::UploadFailed {
                    session,
                    message: err.to_string(),
                },
            },
            EngineEvent::Polled { session, result } => match result {
                Ok(snapshot) => Msg::ProgressReceived { session, snapshot },
                Err(err) if err.is_unauthorized() => Msg::SessionExpired,
                Err(err) => Msg::PollFailed {
                    session,
                    message: err.to_string(),
                },
            },
            EngineEvent::CancelFinished {
                session,
                job_id,
                result,
            } => {
                self.pending_cancels = self.pending_cancels.saturating_sub(1);
                match result {
                    Ok(()) => {
                        uploader_debug!("job {} cancelled (session={})", job_id, session);
                        return;
                    }
                    Err(err) if err.is_unauthorized() => Msg::SessionExpired,
                    Err(err) => {
                        // Local state already moved on; the server may keep running the job.
                        uploader_warn!("cancel of job {} failed: {}", job_id, err);
                        return;
                    }
                }
            }
        };
        self.dispatch(msg);
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::SubmitUpload { session, request } => {
                uploader_info!(
                    "upload session={} lesson={} file={}",
                    session,
                    request.lesson_id,
                    request.file.name
                );
                self.engine.submit(session, request);
            }
            Effect::AbortUpload { session } => self.engine.abort_upload(session),
            Effect::StartPolling { session, job_id } => {
                uploader_info!("tracking job {} (session={})", job_id, session);
                self.engine.start_polling(session, job_id);
            }
            Effect::StopPolling { session } => self.engine.stop_polling(session),
            Effect::CancelJob { session, job_id } => {
                uploader_info!("cancelling job {} (session={})", job_id, session);
                self.pending_cancels += 1;
                self.engine.cancel_job(session, job_id);
            }
            Effect::NotifyCompleted {
                session,
                job_id,
                result,
            } => {
                uploader_info!(
                    "job {} completed (session={}) video={}",
                    job_id,
                    session,
                    result.video_id
                );
                self.observer.on_completed(&job_id, &result);
            }
            Effect::NotifyFailed { session, cause } => {
                uploader_warn!("session={} failed: {}", session, cause);
                self.observer.on_failed(&cause);
            }
            Effect::SignOut => {
                uploader_warn!("credential rejected; signing out");
                self.auth.clear();
                self.observer.on_signed_out();
            }
        }
    }
}

impl<O: SessionObserver> Drop for UploadSession<O> {
    fn drop(&mut self) {
        self.dispatch(Msg::Teardown);
    }
}
