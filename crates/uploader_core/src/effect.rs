use std::fmt;

use crate::{JobId, JobResult, SessionId, UploadRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SubmitUpload {
        session: SessionId,
        request: UploadRequest,
    },
    /// Abort an upload request still in flight.
    AbortUpload { session: SessionId },
    StartPolling { session: SessionId, job_id: JobId },
    StopPolling { session: SessionId },
    CancelJob { session: SessionId, job_id: JobId },
    NotifyCompleted {
        session: SessionId,
        job_id: JobId,
        result: JobResult,
    },
    NotifyFailed {
        session: SessionId,
        cause: FailureCause,
    },
    /// Drop the stored credential; the user must sign in again.
    SignOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The upload request itself failed.
    Rejected(String),
    /// The server reported the job as failed.
    JobFailed(String),
    /// No terminal state within the attempt budget.
    PollingTimedOut { attempts: u32 },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Rejected(message) => write!(f, "upload failed: {message}"),
            FailureCause::JobFailed(reason) => write!(f, "processing failed: {reason}"),
            FailureCause::PollingTimedOut { attempts } => {
                write!(f, "processing did not finish after {attempts} status checks")
            }
        }
    }
}
