//! Terminal rendering of upload records.

use shared::{
    domain::{UploadRecord, UploadStatus},
    protocol::{Rejection, UploadSummary},
};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const BAR_WIDTH: usize = 20;

/// 1024-based size with at most two decimals, trailing zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", SIZE_UNITS[unit])
}

pub fn status_label(status: UploadStatus) -> &'static str {
    match status {
        UploadStatus::Uploading => "Uploading...",
        UploadStatus::Processing => "Processing...",
        UploadStatus::Completed => "Completed",
        UploadStatus::Error => "Error",
    }
}

pub fn progress_bar(progress: f64) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

pub fn render_record(record: &UploadRecord) -> String {
    let head = format!(
        "{:<28} {:>10}  {:<14}",
        record.name,
        format_file_size(record.size),
        status_label(record.status)
    );
    match record.status {
        UploadStatus::Uploading | UploadStatus::Processing => format!(
            "{head} {} {:>5.1}%",
            progress_bar(record.progress),
            record.progress
        ),
        UploadStatus::Completed => format!("{head} ready to query"),
        UploadStatus::Error => format!(
            "{head} {}",
            record
                .error
                .as_deref()
                .unwrap_or("An error occurred while processing the file.")
        ),
    }
}

pub fn render_cancelled(record: &UploadRecord) -> String {
    format!(
        "{:<28} {:>10}  cancelled at {} {:.1}%",
        record.name,
        format_file_size(record.size),
        record.status,
        record.progress
    )
}

pub fn render_rejection(rejection: &Rejection) -> String {
    format!("{:<28} rejected: {}", rejection.name, rejection.error.message)
}

pub fn render_summary(summary: &UploadSummary) -> String {
    format!(
        "{} file(s): {} completed, {} failed, {} still active",
        summary.total,
        summary.completed,
        summary.failed,
        summary.active()
    )
}
