//! Uploader core: pure upload/polling state machine and view-model helpers.
mod effect;
mod msg;
mod snapshot;
mod state;
mod update;
mod validate;
mod view_model;

pub use effect::{Effect, FailureCause};
pub use msg::Msg;
pub use snapshot::{
    clamp_percent, JobId, JobResult, JobStatus, LessonId, ProgressSnapshot, SessionId,
    StepProgress, StepState,
};
pub use state::{Phase, UploadForm, UploadState, DEFAULT_MAX_POLL_ATTEMPTS};
pub use update::update;
pub use validate::{
    media_type_for_extension, validate_file, validate_request, SelectedFile, UploadPolicy,
    UploadRequest, ValidationError, DEFAULT_ALLOWED_TYPES, DEFAULT_MAX_UPLOAD_BYTES,
    MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS,
};
pub use view_model::{
    project, ProgressView, ResultsPanel, StepIcon, StepRowView, StepTone, UploadViewModel,
    VariantRow,
};
