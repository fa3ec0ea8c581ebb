use crate::view_model::{format_size, project, UploadViewModel};
use crate::{
    validate_file, JobId, LessonId, ProgressSnapshot, SelectedFile, SessionId, UploadPolicy,
    ValidationError,
};

/// Ten minutes at the default three second poll interval.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Polling,
    Completed,
    Failed,
}

impl Phase {
    /// A request or poll loop belongs to the current session.
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Uploading | Phase::Polling)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadForm {
    pub lesson_id: Option<LessonId>,
    pub title: String,
    pub description: String,
    pub file: Option<SelectedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadState {
    policy: UploadPolicy,
    max_poll_attempts: u32,
    form: UploadForm,
    phase: Phase,
    next_session: SessionId,
    session: Option<SessionId>,
    job_id: Option<JobId>,
    polling: Option<SessionId>,
    snapshot: Option<ProgressSnapshot>,
    upload_sent: u64,
    upload_total: u64,
    attempts: u32,
    poll_failures: u32,
    validation_error: Option<ValidationError>,
    error: Option<String>,
    notice: Option<String>,
    logged_out: bool,
    dirty: bool,
}

impl Default for UploadState {
    fn default() -> Self {
        Self::new(UploadPolicy::default(), DEFAULT_MAX_POLL_ATTEMPTS)
    }
}

impl UploadState {
    pub fn new(policy: UploadPolicy, max_poll_attempts: u32) -> Self {
        Self {
            policy,
            max_poll_attempts: max_poll_attempts.max(1),
            form: UploadForm::default(),
            phase: Phase::Idle,
            next_session: 1,
            session: None,
            job_id: None,
            polling: None,
            snapshot: None,
            upload_sent: 0,
            upload_total: 0,
            attempts: 0,
            poll_failures: 0,
            validation_error: None,
            error: None,
            notice: None,
            logged_out: false,
            dirty: false,
        }
    }

    pub fn view(&self) -> UploadViewModel {
        let busy = self.phase.is_busy();
        UploadViewModel {
            phase: self.phase,
            lesson_id: self.form.lesson_id,
            file_label: self
                .form
                .file
                .as_ref()
                .map(|f| format!("{} ({})", f.name, format_size(f.size_bytes))),
            job_id: self.job_id.clone(),
            upload_percent: (self.phase == Phase::Uploading && self.upload_total > 0).then(|| {
                (self.upload_sent.min(self.upload_total) * 100 / self.upload_total) as u8
            }),
            progress: self.snapshot.as_ref().map(project),
            attempts: self.attempts,
            max_attempts: self.max_poll_attempts,
            poll_failures: self.poll_failures,
            validation_error: self.validation_error.as_ref().map(ToString::to_string),
            error: self.error.clone(),
            notice: self.notice.clone(),
            logged_out: self.logged_out,
            can_submit: !busy
                && !self.logged_out
                && self.form.file.is_some()
                && self.validation_error.is_none(),
            can_cancel: busy,
            can_reset: self.phase.is_terminal(),
            dirty: self.dirty,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        self.snapshot.as_ref()
    }

    /// Session whose poll loop is live, if any.
    pub fn polling_session(&self) -> Option<SessionId> {
        self.polling
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn form(&self) -> &UploadForm {
        &self.form
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Form edit. An error left by a failed submit no longer applies; only a
    /// problem with the selected file itself stays visible.
    pub(crate) fn form_mut(&mut self) -> &mut UploadForm {
        self.validation_error = self
            .form
            .file
            .as_ref()
            .and_then(|file| validate_file(file, &self.policy).err());
        self.dirty = true;
        &mut self.form
    }

    pub(crate) fn select_file(&mut self, file: SelectedFile) {
        self.validation_error = validate_file(&file, &self.policy).err();
        self.form.file = Some(file);
        self.dirty = true;
    }

    pub(crate) fn clear_file(&mut self) {
        self.form.file = None;
        self.validation_error = None;
        self.dirty = true;
    }

    pub(crate) fn set_validation_error(&mut self, err: ValidationError) {
        self.validation_error = Some(err);
        self.dirty = true;
    }

    /// Moves to `Uploading` under a fresh session id.
    pub(crate) fn begin_session(&mut self) -> SessionId {
        let session = self.next_session;
        self.next_session += 1;
        self.clear_progress();
        self.validation_error = None;
        self.phase = Phase::Uploading;
        self.session = Some(session);
        self.dirty = true;
        session
    }

    /// Only the active upload of the current session may be accepted.
    pub(crate) fn is_uploading(&self, session: SessionId) -> bool {
        self.phase == Phase::Uploading && self.session == Some(session)
    }

    pub(crate) fn is_polling(&self, session: SessionId) -> bool {
        self.phase == Phase::Polling && self.polling == Some(session)
    }

    pub(crate) fn record_upload_progress(&mut self, sent: u64, total: u64) {
        self.upload_sent = sent;
        self.upload_total = total;
        self.dirty = true;
    }

    pub(crate) fn start_polling(&mut self, session: SessionId, job_id: JobId) {
        self.phase = Phase::Polling;
        self.job_id = Some(job_id);
        self.polling = Some(session);
        self.attempts = 0;
        self.poll_failures = 0;
        self.dirty = true;
    }

    /// Counts one poll outcome; returns whether the attempt budget is spent.
    pub(crate) fn record_attempt(&mut self, failed: bool) -> bool {
        self.attempts += 1;
        if failed {
            self.poll_failures += 1;
        } else {
            self.poll_failures = 0;
        }
        self.dirty = true;
        self.attempts >= self.max_poll_attempts
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: ProgressSnapshot) {
        self.snapshot = Some(snapshot);
        self.dirty = true;
    }

    pub(crate) fn complete(&mut self) {
        self.phase = Phase::Completed;
        self.polling = None;
        self.session = None;
        self.dirty = true;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.phase = Phase::Failed;
        self.polling = None;
        self.session = None;
        self.error = Some(message);
        self.dirty = true;
    }

    /// Back to `Idle` with an error; used when the upload request fails.
    pub(crate) fn abandon_with_error(&mut self, message: String) {
        self.go_idle();
        self.error = Some(message);
    }

    pub(crate) fn go_idle(&mut self) {
        self.phase = Phase::Idle;
        self.polling = None;
        self.session = None;
        self.clear_progress();
        self.dirty = true;
    }

    pub(crate) fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
        self.dirty = true;
    }

    pub(crate) fn set_logged_out(&mut self, logged_out: bool) {
        self.logged_out = logged_out;
        self.dirty = true;
    }

    pub(crate) fn set_error(&mut self, message: Option<String>) {
        self.error = message;
        self.dirty = true;
    }

    fn clear_progress(&mut self) {
        self.job_id = None;
        self.snapshot = None;
        self.upload_sent = 0;
        self.upload_total = 0;
        self.attempts = 0;
        self.poll_failures = 0;
        self.error = None;
        self.notice = None;
    }
}
