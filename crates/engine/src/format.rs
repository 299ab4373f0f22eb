//! Timestamp and log-line rendering.
//!
//! The server renders each job's timestamp text once, at materialization;
//! writers render whole lines either through [`TextFormatter`] or a custom
//! [`FormatLine`] closure.

use chrono::{Local, TimeZone, Utc};

use rotolog_core::callpath::FileNameMode;
use rotolog_core::job::Job;

/// Renders one job as a single log line, given the running line count of the
/// target. The returned string carries its own trailing newline.
pub type FormatLine = Box<dyn Fn(&Job, u64) -> String + Send>;

/// Renders a timestamp in the server's configured format.
///
/// `None` is the null mode: no timestamp text at all. The format string uses
/// strftime syntax with `%3N` as millisecond token; it must have been
/// validated (and alias-resolved) at setup time.
pub fn render_timestamp(timestamp_ms: u64, format: Option<&str>) -> String {
    let Some(format) = format else {
        return String::new();
    };
    let Some(utc) = Utc.timestamp_millis_opt(timestamp_ms as i64).single() else {
        return String::new();
    };
    let local = utc.with_timezone(&Local);
    let format = format.replace("%3N", &format!("{:03}", timestamp_ms % 1000));
    local.format(&format).to_string()
}

/// Convenience token for the caller's site: `*file(line)`, or "" when stack
/// capture was disabled.
pub fn caller_site_str(job: &Job, mode: FileNameMode) -> String {
    match (job.caller_file(mode), job.caller_line()) {
        (Some(file), Some(line)) => format!("*{file}({line})"),
        _ => String::new(),
    }
}

/// Default line layout for text writers.
///
/// `E 3.[4711:3@13:59.59;042] disk full :::check_disk |db(12)<-...<-app(99)`
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter {
    pub file_name_mode: FileNameMode,
}

impl TextFormatter {
    pub fn new(file_name_mode: FileNameMode) -> Self {
        Self { file_name_mode }
    }

    pub fn format_line(&self, job: &Job, line_no: u64) -> String {
        let func = job
            .caller_function
            .as_deref()
            .map(|f| format!(" :::{f}"))
            .unwrap_or_default();
        format!(
            "{} {}.[{}:{}@{}] {}{} {}\n",
            job.cat,
            line_no,
            job.pid,
            job.seq,
            job.ts_text,
            job.msg,
            func,
            job.path_str(self.file_name_mode, 0),
        )
    }

    /// Boxes this formatter as a [`FormatLine`].
    pub fn into_format_line(self) -> FormatLine {
        Box::new(move |job, line_no| self.format_line(job, line_no))
    }
}

/// A writer's line layout: the adjustable default text layout, or a fixed
/// custom closure.
///
/// The text variant keeps its file-name mode settable so a server can push
/// its configured mode into the writer; a custom closure renders whatever it
/// wants and ignores mode changes.
pub enum LineLayout {
    Text(TextFormatter),
    Custom(FormatLine),
}

impl LineLayout {
    /// Default text layout in Short mode.
    pub fn text() -> Self {
        LineLayout::Text(TextFormatter::default())
    }

    pub fn render(&self, job: &Job, line_no: u64) -> String {
        match self {
            LineLayout::Text(formatter) => formatter.format_line(job, line_no),
            LineLayout::Custom(format) => format(job, line_no),
        }
    }

    /// No effect on a custom closure.
    pub fn set_file_name_mode(&mut self, mode: FileNameMode) {
        if let LineLayout::Text(formatter) = self {
            formatter.file_name_mode = mode;
        }
    }
}

impl From<TextFormatter> for LineLayout {
    fn from(formatter: TextFormatter) -> Self {
        LineLayout::Text(formatter)
    }
}

impl From<FormatLine> for LineLayout {
    fn from(format: FormatLine) -> Self {
        LineLayout::Custom(format)
    }
}
