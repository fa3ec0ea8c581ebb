use crate::{JobId, LessonId, ProgressSnapshot, SelectedFile, SessionId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked a file; it is validated immediately.
    FileSelected(SelectedFile),
    /// User removed the selected file.
    FileCleared,
    /// User chose the lesson the video belongs to.
    LessonSelected(LessonId),
    TitleChanged(String),
    DescriptionChanged(String),
    /// User submitted the upload form.
    SubmitClicked,
    /// Bytes of the upload body handed to the transport so far.
    UploadProgress {
        session: SessionId,
        sent: u64,
        total: u64,
    },
    /// Server accepted the upload and issued a job.
    UploadAccepted { session: SessionId, job_id: JobId },
    /// Upload request failed (network or server rejection).
    UploadFailed { session: SessionId, message: String },
    /// A poll returned a snapshot.
    ProgressReceived {
        session: SessionId,
        snapshot: ProgressSnapshot,
    },
    /// A poll request failed in transit.
    PollFailed { session: SessionId, message: String },
    /// User clicked Cancel.
    CancelClicked,
    /// Any request came back 401.
    SessionExpired,
    /// A fresh credential was supplied after expiry.
    SignedIn,
    /// User dismissed a finished upload.
    ResetClicked,
    /// Owner of the session is going away.
    Teardown,
}
