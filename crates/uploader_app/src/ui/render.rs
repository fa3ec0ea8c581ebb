use uploader_core::{Phase, ProgressView, StepIcon, UploadViewModel};

const BAR_WIDTH: usize = 30;

/// Turns the view model into the lines the terminal shows. Pure.
pub fn render(view: &UploadViewModel) -> Vec<String> {
    let mut lines = Vec::new();

    let file = view.file_label.as_deref().unwrap_or("no file");
    match view.phase {
        Phase::Idle => lines.push(format!("Ready: {file}")),
        Phase::Uploading => {
            let percent = view.upload_percent.unwrap_or(0);
            lines.push(format!(
                "Uploading {file} {} {percent}%",
                bar(f32::from(percent) / 100.0)
            ));
        }
        Phase::Polling | Phase::Completed | Phase::Failed => {
            let job = view
                .job_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            match &view.progress {
                Some(progress) => render_progress(&mut lines, &job, progress),
                None => lines.push(format!("Job {job}: waiting for first status")),
            }
            if view.phase == Phase::Polling && view.poll_failures > 0 {
                lines.push(format!(
                    "  status check {}/{} ({} failed)",
                    view.attempts, view.max_attempts, view.poll_failures
                ));
            }
        }
    }

    if let Some(error) = &view.validation_error {
        lines.push(format!("Invalid: {error}"));
    }
    let job_failure = view.progress.as_ref().and_then(|p| p.failure.as_ref());
    if let Some(error) = view.error.as_ref().filter(|e| Some(*e) != job_failure) {
        lines.push(format!("Error: {error}"));
    }
    if let Some(notice) = &view.notice {
        lines.push(notice.clone());
    }
    if view.logged_out {
        lines.push("Signed out: pass a fresh --token to upload again".to_string());
    }
    lines
}

fn render_progress(lines: &mut Vec<String>, job: &str, progress: &ProgressView) {
    let mut head = format!(
        "Job {job}: {} {} {}%",
        progress.status_label,
        bar(progress.fraction),
        progress.percent
    );
    if let Some(step) = &progress.current_step {
        head.push_str(&format!(" - {step}"));
    }
    if let Some(eta) = &progress.eta_line {
        head.push_str(&format!(" ({eta})"));
    }
    lines.push(head);

    for step in &progress.steps {
        lines.push(format!(
            "  {} {} {}%",
            icon(step.icon),
            step.label,
            step.percent
        ));
    }

    if let Some(reason) = &progress.failure {
        lines.push(format!("Failed: {reason}"));
    }
    if let Some(results) = &progress.results {
        lines.push(format!(
            "Video {} ready: {}, {}",
            results.video_id, results.duration_label, results.size_label
        ));
        for variant in &results.variants {
            lines.push(format!("  {}: {}", variant.quality, variant.url));
        }
        if let Some(thumbnail) = &results.thumbnail_url {
            lines.push(format!("  thumbnail: {thumbnail}"));
        }
    }
}

fn bar(fraction: f32) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn icon(icon: StepIcon) -> &'static str {
    match icon {
        StepIcon::Clock => "[ ]",
        StepIcon::Spinner => "[~]",
        StepIcon::Check => "[x]",
        StepIcon::Cross => "[!]",
    }
}
