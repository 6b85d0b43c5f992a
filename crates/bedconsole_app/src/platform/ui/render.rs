use bedconsole_core::{
    AppViewModel, JobDetailView, JobId, JobRowView, PollState, SubmissionResult,
    SubmissionStatus,
};

/// Turns successive view models into terminal lines, printing only what
/// changed since the previous frame.
#[derive(Debug, Default)]
pub struct Renderer {
    submission: Option<SubmissionStatus>,
    job: Option<JobId>,
    status_line: Option<String>,
    logs_printed: usize,
    finished_reported: bool,
    refresh_error: Option<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &AppViewModel) -> Vec<String> {
        let mut lines = Vec::new();

        if view.last_submission != self.submission {
            if let Some(status) = &view.last_submission {
                lines.extend(submission_lines(status));
            }
            self.submission = view.last_submission.clone();
        }

        if view.refresh_error != self.refresh_error {
            if let Some(error) = &view.refresh_error {
                lines.push(format!("Job list refresh failed: {error}"));
            }
            self.refresh_error = view.refresh_error.clone();
        }

        match &view.selected {
            Some(detail) => self.render_detail(detail, &mut lines),
            None => {
                self.job = None;
                self.status_line = None;
            }
        }

        lines
    }

    fn render_detail(&mut self, detail: &JobDetailView, lines: &mut Vec<String>) {
        if self.job.as_ref() != Some(&detail.job_id) {
            self.job = Some(detail.job_id.clone());
            self.status_line = None;
            self.logs_printed = 0;
            self.finished_reported = false;
        }

        let status_line = status_line(detail);
        if self.status_line.as_deref() != Some(status_line.as_str()) {
            lines.push(status_line.clone());
            self.status_line = Some(status_line);
        }

        let fresh = detail.log_count.saturating_sub(self.logs_printed);
        if fresh > 0 {
            let start = detail.log_tail.len().saturating_sub(fresh);
            let skipped = fresh - (detail.log_tail.len() - start);
            if skipped > 0 {
                lines.push(format!("  ... {skipped} earlier log lines"));
            }
            lines.extend(detail.log_tail[start..].iter().map(|line| format!("  {line}")));
            self.logs_printed = detail.log_count;
        }

        if detail.status.is_terminal() && !self.finished_reported {
            self.finished_reported = true;
            if let Some(error) = &detail.error_message {
                lines.push(format!("Job {} failed: {error}", detail.job_id));
            }
            for file in &detail.output_files {
                lines.push(format!("  output: {file}"));
            }
        }
    }
}

fn status_line(detail: &JobDetailView) -> String {
    let mut line = format!(
        "[{}] {} {} {}%",
        detail.job_id, detail.job_type, detail.status, detail.progress
    );
    if detail.poll_errors > 0 {
        let reason = detail.last_poll_error.as_deref().unwrap_or("unknown");
        line.push_str(&format!(
            " (poll errors: {}, last: {reason})",
            detail.poll_errors
        ));
    }
    line
}

fn submission_lines(status: &SubmissionStatus) -> Vec<String> {
    match status {
        SubmissionStatus::Rejected(errors) => {
            let mut lines = vec!["Submission rejected:".to_string()];
            lines.extend(errors.iter().map(|error| format!("  {error}")));
            lines
        }
        SubmissionStatus::Dispatched { mode, job_id, .. } => match job_id {
            Some(job_id) => vec![format!("Submitted {mode} as {job_id}")],
            None => vec![format!("Submitted {mode}")],
        },
        SubmissionStatus::Finished { result, .. } => match result {
            SubmissionResult::Compiled(compiled) => vec![
                "Parameters compiled".to_string(),
                format!("  bed file: {}", compiled.bed_file),
                format!("  json file: {}", compiled.json_file),
            ],
            SubmissionResult::Tracked(job_id) => vec![format!("Tracking job {job_id}")],
        },
        SubmissionStatus::Failed { error, .. } => vec![format!("Submission failed: {error}")],
        SubmissionStatus::Cancelled => vec!["Submission cancelled".to_string()],
    }
}

/// Fixed-width table of every tracked job in registry order.
pub fn job_table(view: &AppViewModel) -> Vec<String> {
    if view.jobs.is_empty() {
        return vec!["No jobs".to_string()];
    }
    let id_width = view
        .jobs
        .iter()
        .map(|row| row.job_id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("JOB".len());
    let mut lines = vec![format!(
        "{:<id_width$}  {:<14}  {:<10}  {:>4}  {:<8}  UPDATED",
        "JOB", "TYPE", "STATUS", "PCT", "POLL"
    )];
    lines.extend(view.jobs.iter().map(|row| table_row(row, id_width)));
    lines
}

fn table_row(row: &JobRowView, id_width: usize) -> String {
    format!(
        "{:<id_width$}  {:<14}  {:<10}  {:>3}%  {:<8}  {}",
        row.job_id.as_str(),
        row.job_type.as_str(),
        row.status.as_str(),
        row.progress,
        poll_label(row.polling),
        row.updated_at.as_deref().unwrap_or("-")
    )
}

fn poll_label(state: PollState) -> &'static str {
    match state {
        PollState::Idle => "idle",
        PollState::Polling => "polling",
        PollState::Stopped => "stopped",
    }
}
