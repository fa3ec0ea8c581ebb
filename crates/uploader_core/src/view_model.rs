use crate::{JobId, JobResult, JobStatus, LessonId, Phase, ProgressSnapshot, StepState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTone {
    Muted,
    Active,
    Success,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepIcon {
    Clock,
    Spinner,
    Check,
    Cross,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRowView {
    pub label: String,
    pub state: StepState,
    pub percent: u8,
    pub tone: StepTone,
    pub icon: StepIcon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRow {
    pub quality: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsPanel {
    pub video_id: String,
    pub variants: Vec<VariantRow>,
    pub duration_label: String,
    pub size_label: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub status_label: &'static str,
    pub percent: u8,
    pub fraction: f32,
    pub current_step: Option<String>,
    pub steps: Vec<StepRowView>,
    pub eta_line: Option<String>,
    pub failure: Option<String>,
    /// Only present once the job completed.
    pub results: Option<ResultsPanel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadViewModel {
    pub phase: Phase,
    pub lesson_id: Option<LessonId>,
    pub file_label: Option<String>,
    pub job_id: Option<JobId>,
    /// Share of the file sent, only while uploading.
    pub upload_percent: Option<u8>,
    pub progress: Option<ProgressView>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub poll_failures: u32,
    pub validation_error: Option<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub logged_out: bool,
    pub can_submit: bool,
    pub can_cancel: bool,
    pub can_reset: bool,
    pub dirty: bool,
}

/// Projects a snapshot into what the progress panel shows. Pure.
pub fn project(snapshot: &ProgressSnapshot) -> ProgressView {
    let percent = snapshot.percent.min(100);
    ProgressView {
        status_label: status_label(&snapshot.status),
        percent,
        fraction: f32::from(percent) / 100.0,
        current_step: snapshot
            .current_step
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .cloned(),
        steps: snapshot
            .steps
            .iter()
            .map(|step| {
                let (tone, icon) = step_style(step.state);
                StepRowView {
                    label: step.name.clone(),
                    state: step.state,
                    percent: step.percent.min(100),
                    tone,
                    icon,
                }
            })
            .collect(),
        eta_line: snapshot
            .eta
            .as_ref()
            .filter(|eta| !eta.trim().is_empty())
            .map(|eta| format!("ETA: {}", eta.trim())),
        failure: match &snapshot.status {
            JobStatus::Failed(reason) => Some(reason.clone()),
            _ => None,
        },
        results: snapshot.result().map(results_panel),
    }
}

fn status_label(status: &JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Queued",
        JobStatus::Processing => "Processing",
        JobStatus::Completed(_) => "Completed",
        JobStatus::Failed(_) => "Failed",
    }
}

fn step_style(state: StepState) -> (StepTone, StepIcon) {
    match state {
        StepState::Pending => (StepTone::Muted, StepIcon::Clock),
        StepState::Processing => (StepTone::Active, StepIcon::Spinner),
        StepState::Completed => (StepTone::Success, StepIcon::Check),
        StepState::Failed => (StepTone::Danger, StepIcon::Cross),
    }
}

fn results_panel(result: &JobResult) -> ResultsPanel {
    let mut variants: Vec<VariantRow> = result
        .urls
        .iter()
        .map(|(quality, url)| VariantRow {
            quality: quality.clone(),
            url: url.clone(),
        })
        .collect();
    // Numeric resolutions ascending, anything else ("source") after them.
    variants.sort_by_key(|row| {
        (
            resolution(&row.quality).unwrap_or(u32::MAX),
            row.quality.clone(),
        )
    });

    ResultsPanel {
        video_id: result.video_id.clone(),
        variants,
        duration_label: format_duration(result.duration_secs),
        size_label: format_size(result.file_size),
        thumbnail_url: result.thumbnail_url.clone(),
    }
}

fn resolution(quality: &str) -> Option<u32> {
    let digits: String = quality.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn durations_and_sizes_are_human_readable() {
        assert_eq!(format_duration(120.0), "2:00");
        assert_eq!(format_duration(3725.4), "1:02:05");
        assert_eq!(format_duration(f64::NAN), "0:00");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(10_485_760), "10.0 MiB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn variants_sort_by_resolution() {
        let urls: BTreeMap<String, String> =
            [("source", "s"), ("1080p", "b"), ("360p", "c"), ("720p", "a")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        let panel = results_panel(&JobResult {
            video_id: "v".into(),
            urls,
            duration_secs: 1.0,
            file_size: 1,
            thumbnail_url: None,
        });
        let order: Vec<_> = panel.variants.iter().map(|v| v.quality.as_str()).collect();
        assert_eq!(order, vec!["360p", "720p", "1080p", "source"]);
    }
}
