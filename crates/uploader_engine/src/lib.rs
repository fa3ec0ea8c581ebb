//! Uploader engine: REST client, poll loop and effect execution.
mod auth;
mod client;
mod engine;
mod poller;
mod session;
mod types;
mod wire;

pub use auth::AuthContext;
pub use client::{
    ClientSettings, JobApi, NoProgress, ProgressSink, ReqwestJobApi, DEFAULT_BASE_URL,
};
pub use engine::EngineHandle;
pub use poller::{PollHandle, PollSettings, DEFAULT_POLL_INTERVAL};
pub use session::{SessionObserver, UploadSession};
pub use types::{ApiError, EngineError, EngineEvent, FailureKind};
pub use wire::{ProgressResponse, SubmitResponse, WireError};
