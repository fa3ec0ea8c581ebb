use std::fmt;

use uploader_core::{JobId, ProgressSnapshot, SessionId};

/// Everything the engine thread reports back to the session owner.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    UploadProgress {
        session: SessionId,
        sent: u64,
        total: u64,
    },
    UploadFinished {
        session: SessionId,
        result: Result<JobId, ApiError>,
    },
    Polled {
        session: SessionId,
        result: Result<ProgressSnapshot, ApiError>,
    },
    CancelFinished {
        session: SessionId,
        job_id: JobId,
        result: Result<(), ApiError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == FailureKind::Unauthorized
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Unauthorized,
    HttpStatus(u16),
    Timeout,
    Network,
    InvalidResponse,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to spawn engine thread: {0}")]
    Thread(#[source] std::io::Error),
    #[error("client setup failed: {0}")]
    Client(#[from] ApiError),
}
