use crate::{
    validate_request, Effect, FailureCause, JobStatus, Msg, Phase, ProgressSnapshot, SessionId,
    UploadState,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Terminal notifications are only produced while the session is still
/// polling, so repeated or late responses can never fire them twice.
pub fn update(mut state: UploadState, msg: Msg) -> (UploadState, Vec<Effect>) {
    let effects = match msg {
        Msg::FileSelected(file) => {
            if !state.phase().is_busy() {
                state.select_file(file);
            }
            Vec::new()
        }
        Msg::FileCleared => {
            if !state.phase().is_busy() {
                state.clear_file();
            }
            Vec::new()
        }
        Msg::LessonSelected(lesson_id) => {
            if !state.phase().is_busy() {
                state.form_mut().lesson_id = Some(lesson_id);
            }
            Vec::new()
        }
        Msg::TitleChanged(title) => {
            if !state.phase().is_busy() {
                state.form_mut().title = title;
            }
            Vec::new()
        }
        Msg::DescriptionChanged(description) => {
            if !state.phase().is_busy() {
                state.form_mut().description = description;
            }
            Vec::new()
        }
        Msg::SubmitClicked => submit(&mut state),
        Msg::UploadProgress {
            session,
            sent,
            total,
        } => {
            if state.is_uploading(session) {
                state.record_upload_progress(sent, total);
            }
            Vec::new()
        }
        Msg::UploadAccepted { session, job_id } => {
            if state.is_uploading(session) {
                state.start_polling(session, job_id.clone());
                vec![Effect::StartPolling { session, job_id }]
            } else {
                // Nobody tracks this job any more; ask the server to drop it.
                vec![Effect::CancelJob { session, job_id }]
            }
        }
        Msg::UploadFailed { session, message } => {
            if state.is_uploading(session) {
                state.abandon_with_error(message.clone());
                vec![Effect::NotifyFailed {
                    session,
                    cause: FailureCause::Rejected(message),
                }]
            } else {
                Vec::new()
            }
        }
        Msg::ProgressReceived { session, snapshot } => {
            if state.is_polling(session) {
                apply_progress(&mut state, session, snapshot)
            } else {
                Vec::new()
            }
        }
        Msg::PollFailed { session, .. } => {
            if state.is_polling(session) {
                let exhausted = state.record_attempt(true);
                if exhausted {
                    time_out(&mut state, session)
                } else {
                    Vec::new()
                }
            } else {
                Vec::new()
            }
        }
        Msg::CancelClicked => cancel(&mut state),
        Msg::SessionExpired => {
            let mut effects = release(&state);
            if state.phase().is_busy() {
                state.go_idle();
            }
            if !state.is_logged_out() {
                state.set_logged_out(true);
                state.set_error(Some("Session expired, sign in again".to_string()));
                effects.push(Effect::SignOut);
            }
            effects
        }
        Msg::SignedIn => {
            if state.is_logged_out() {
                state.set_logged_out(false);
                state.set_error(None);
            }
            Vec::new()
        }
        Msg::ResetClicked => {
            if !state.phase().is_busy() {
                state.go_idle();
            }
            Vec::new()
        }
        Msg::Teardown => {
            let effects = release(&state);
            if state.phase().is_busy() {
                state.go_idle();
            }
            effects
        }
    };

    (state, effects)
}

fn submit(state: &mut UploadState) -> Vec<Effect> {
    if state.phase().is_busy() || state.is_logged_out() {
        return Vec::new();
    }
    match validate_request(state.form(), state.policy()) {
        Ok(request) => {
            let session = state.begin_session();
            vec![Effect::SubmitUpload { session, request }]
        }
        Err(err) => {
            state.set_validation_error(err);
            Vec::new()
        }
    }
}

fn apply_progress(
    state: &mut UploadState,
    session: SessionId,
    snapshot: ProgressSnapshot,
) -> Vec<Effect> {
    let exhausted = state.record_attempt(false);
    let status = snapshot.status.clone();
    state.apply_snapshot(snapshot);

    match status {
        JobStatus::Completed(result) => {
            state.complete();
            let Some(job_id) = state.job_id().cloned() else {
                return vec![Effect::StopPolling { session }];
            };
            vec![
                Effect::StopPolling { session },
                Effect::NotifyCompleted {
                    session,
                    job_id,
                    result,
                },
            ]
        }
        JobStatus::Failed(reason) => {
            state.fail(reason.clone());
            vec![
                Effect::StopPolling { session },
                Effect::NotifyFailed {
                    session,
                    cause: FailureCause::JobFailed(reason),
                },
            ]
        }
        JobStatus::Pending | JobStatus::Processing if exhausted => time_out(state, session),
        JobStatus::Pending | JobStatus::Processing => Vec::new(),
    }
}

fn time_out(state: &mut UploadState, session: SessionId) -> Vec<Effect> {
    let cause = FailureCause::PollingTimedOut {
        attempts: state.attempts(),
    };
    state.fail(cause.to_string());
    vec![
        Effect::StopPolling { session },
        Effect::NotifyFailed { session, cause },
    ]
}

fn cancel(state: &mut UploadState) -> Vec<Effect> {
    let effects = match (state.phase(), state.session()) {
        (Phase::Polling, Some(session)) => {
            let mut effects = Vec::with_capacity(2);
            if let Some(job_id) = state.job_id().cloned() {
                effects.push(Effect::CancelJob { session, job_id });
            }
            effects.push(Effect::StopPolling { session });
            effects
        }
        (Phase::Uploading, Some(session)) => vec![Effect::AbortUpload { session }],
        _ => return Vec::new(),
    };
    state.go_idle();
    state.set_notice("Upload cancelled");
    effects
}

/// Effects that release whatever the active session holds.
fn release(state: &UploadState) -> Vec<Effect> {
    match (state.phase(), state.session()) {
        (Phase::Polling, Some(session)) => vec![Effect::StopPolling { session }],
        (Phase::Uploading, Some(session)) => vec![Effect::AbortUpload { session }],
        _ => Vec::new(),
    }
}
