use uploader_core::{update, JobId, JobStatus, Msg, ProgressSnapshot, UploadState};

#[test]
fn events_for_unknown_sessions_are_noops() {
    let state = UploadState::new(Default::default(), 10);
    for msg in [
        Msg::UploadProgress {
            session: 9,
            sent: 1,
            total: 2,
        },
        Msg::UploadFailed {
            session: 9,
            message: "gone".to_string(),
        },
        Msg::ProgressReceived {
            session: 9,
            snapshot: ProgressSnapshot::new(JobStatus::Processing, 50),
        },
        Msg::PollFailed {
            session: 9,
            message: "timeout".to_string(),
        },
    ] {
        let (next, effects) = update(state.clone(), msg);
        assert_eq!(state, next);
        assert!(effects.is_empty());
    }

    // Nobody waits for this job, so the only reaction is to cancel it.
    let (next, effects) = update(
        state.clone(),
        Msg::UploadAccepted {
            session: 9,
            job_id: JobId::from("job-9"),
        },
    );
    assert_eq!(state, next);
    assert_eq!(effects.len(), 1);
}

#[test]
fn cancel_and_teardown_while_idle_do_not_mark_dirty() {
    for msg in [Msg::CancelClicked, Msg::Teardown] {
        let (mut next, effects) = update(UploadState::default(), msg);
        assert!(effects.is_empty());
        assert!(!next.consume_dirty());
    }
}
