use std::sync::{mpsc, Arc};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uploader_core::{JobId, SessionId};
use uploader_logging::{uploader_debug, uploader_warn};

use crate::{EngineEvent, JobApi};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Owned poll timer for one job. Stopping or dropping it ends the loop and
/// abandons any request still in flight.
#[derive(Debug)]
pub struct PollHandle {
    session: SessionId,
    job_id: JobId,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Starts polling `job_id`; the first request goes out one interval from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        api: Arc<dyn JobApi>,
        session: SessionId,
        job_id: JobId,
        settings: PollSettings,
        events: mpsc::Sender<EngineEvent>,
    ) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            api,
            session,
            job_id.clone(),
            settings.interval,
            token.clone(),
            events,
        ));
        uploader_debug!("poll started session={} job={}", session, job_id);
        Self {
            session,
            job_id,
            token,
            task,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// The loop ended on its own (terminal snapshot, 401, or receiver gone).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
        self.task.abort();
        uploader_debug!("poll stopped session={} job={}", self.session, self.job_id);
    }
}

async fn poll_loop(
    api: Arc<dyn JobApi>,
    session: SessionId,
    job_id: JobId,
    interval: Duration,
    token: CancellationToken,
    events: mpsc::Sender<EngineEvent>,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = api.get_progress(&job_id) => result,
        };

        // Stop on our own after a terminal answer so no request follows it.
        let finished = match &result {
            Ok(snapshot) => snapshot.status.is_terminal(),
            Err(err) if err.is_unauthorized() => true,
            Err(err) => {
                uploader_warn!("poll for job {} failed, retrying: {}", job_id, err);
                false
            }
        };

        if events.send(EngineEvent::Polled { session, result }).is_err() || finished {
            break;
        }
    }
}
