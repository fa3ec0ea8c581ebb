use std::path::{Path, PathBuf};

use crate::state::UploadForm;
use crate::LessonId;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
    "video/mpeg",
];

/// A file picked for upload, described without reading its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub media_type: Option<String>,
    pub size_bytes: u64,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>, media_type: Option<String>, size_bytes: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            media_type,
            size_bytes,
        }
    }

    /// Declared media type, or the one implied by the file extension.
    pub fn effective_media_type(&self) -> Option<String> {
        self.media_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_lowercase())
            .or_else(|| media_type_for_extension(&self.path).map(ToOwned::to_owned))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub allowed_types: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_types: DEFAULT_ALLOWED_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            ..Self::default()
        }
    }

    fn allows(&self, media_type: &str) -> bool {
        self.allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }
}

/// A validated submission, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub lesson_id: LessonId,
    pub file: SelectedFile,
    pub media_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no file selected")]
    NoFileSelected,
    #[error("select a lesson before uploading")]
    MissingLesson,
    #[error("could not determine the type of {name}")]
    UnknownType { name: String },
    #[error("unsupported file type {media_type}; expected a video (mp4, webm, mov, avi, mkv, mpeg)")]
    UnsupportedType { media_type: String },
    #[error("file is empty")]
    EmptyFile,
    #[error("file is too large ({actual} bytes, limit {max_bytes} bytes)")]
    TooLarge { max_bytes: u64, actual: u64 },
    #[error("title is longer than {max} characters")]
    TitleTooLong { max: usize },
    #[error("description is longer than {max} characters")]
    DescriptionTooLong { max: usize },
}

pub fn media_type_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "mpeg" | "mpg" => "video/mpeg",
        _ => return None,
    };
    Some(media_type)
}

/// Checks type and size; returns the effective media type.
pub fn validate_file(file: &SelectedFile, policy: &UploadPolicy) -> Result<String, ValidationError> {
    let media_type = file
        .effective_media_type()
        .ok_or_else(|| ValidationError::UnknownType {
            name: file.name.clone(),
        })?;
    if !policy.allows(&media_type) {
        return Err(ValidationError::UnsupportedType { media_type });
    }
    if file.size_bytes == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if file.size_bytes > policy.max_bytes {
        return Err(ValidationError::TooLarge {
            max_bytes: policy.max_bytes,
            actual: file.size_bytes,
        });
    }
    Ok(media_type)
}

pub fn validate_request(
    form: &UploadForm,
    policy: &UploadPolicy,
) -> Result<UploadRequest, ValidationError> {
    let file = form.file.as_ref().ok_or(ValidationError::NoFileSelected)?;
    let media_type = validate_file(file, policy)?;
    let lesson_id = form.lesson_id.ok_or(ValidationError::MissingLesson)?;

    let title = non_empty(&form.title);
    if title.as_ref().is_some_and(|t| t.chars().count() > MAX_TITLE_CHARS) {
        return Err(ValidationError::TitleTooLong {
            max: MAX_TITLE_CHARS,
        });
    }
    let description = non_empty(&form.description);
    if description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS)
    {
        return Err(ValidationError::DescriptionTooLong {
            max: MAX_DESCRIPTION_CHARS,
        });
    }

    Ok(UploadRequest {
        lesson_id,
        file: file.clone(),
        media_type,
        title,
        description,
    })
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, media_type: Option<&str>, size: u64) -> SelectedFile {
        SelectedFile::new(name, media_type.map(ToOwned::to_owned), size)
    }

    #[test]
    fn mp4_within_limit_is_accepted() {
        let policy = UploadPolicy::default();
        let clip = file("clip.mp4", Some("video/mp4"), 10 * 1024 * 1024);
        assert_eq!(validate_file(&clip, &policy).unwrap(), "video/mp4");
    }

    #[test]
    fn zip_is_rejected() {
        let policy = UploadPolicy::default();
        let archive = file("lesson.zip", Some("application/zip"), 1024);
        assert_eq!(
            validate_file(&archive, &policy),
            Err(ValidationError::UnsupportedType {
                media_type: "application/zip".into()
            })
        );
    }

    #[test]
    fn extension_fills_in_missing_type() {
        let policy = UploadPolicy::default();
        assert_eq!(
            validate_file(&file("Lecture.MKV", None, 5), &policy).unwrap(),
            "video/x-matroska"
        );
        assert_eq!(
            validate_file(&file("notes", None, 5), &policy),
            Err(ValidationError::UnknownType {
                name: "notes".into()
            })
        );
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let policy = UploadPolicy::with_max_bytes(100);
        assert!(validate_file(&file("a.mp4", None, 100), &policy).is_ok());
        assert_eq!(
            validate_file(&file("a.mp4", None, 101), &policy),
            Err(ValidationError::TooLarge {
                max_bytes: 100,
                actual: 101
            })
        );
        assert_eq!(
            validate_file(&file("a.mp4", None, 0), &policy),
            Err(ValidationError::EmptyFile)
        );
    }

    #[test]
    fn request_trims_metadata_and_requires_lesson() {
        let policy = UploadPolicy::default();
        let mut form = UploadForm {
            file: Some(file("clip.mp4", None, 10)),
            title: "  Intro  ".into(),
            description: "   ".into(),
            ..UploadForm::default()
        };
        assert_eq!(
            validate_request(&form, &policy),
            Err(ValidationError::MissingLesson)
        );

        form.lesson_id = Some(42);
        let request = validate_request(&form, &policy).unwrap();
        assert_eq!(request.lesson_id, 42);
        assert_eq!(request.title.as_deref(), Some("Intro"));
        assert_eq!(request.description, None);
    }

    #[test]
    fn overlong_title_is_rejected() {
        let form = UploadForm {
            lesson_id: Some(1),
            file: Some(file("clip.mp4", None, 10)),
            title: "x".repeat(MAX_TITLE_CHARS + 1),
            ..UploadForm::default()
        };
        assert_eq!(
            validate_request(&form, &UploadPolicy::default()),
            Err(ValidationError::TitleTooLong {
                max: MAX_TITLE_CHARS
            })
        );
    }
}
