//! Stdout writer backend.
//!
//! Minimal human-oriented layout for interactive runs: timestamp, message,
//! the caller's site and the remaining trail. Not meant for rotation.

use std::io::Write as _;

use rotolog_core::callpath::FileNameMode;
use rotolog_core::error::WriteError;
use rotolog_core::job::Job;
use rotolog_core::writer::Writer;

use crate::format::caller_site_str;

/// Writer printing one compact line per job to standard output.
pub struct StdoutWriter {
    file_name_mode: FileNameMode,
    /// Prefix each line with the producer-side sequence number
    with_seq: bool,
    line_count: u64,
}

impl StdoutWriter {
    pub fn new(file_name_mode: FileNameMode) -> Self {
        Self {
            file_name_mode,
            with_seq: false,
            line_count: 0,
        }
    }

    pub fn with_seq(mut self) -> Self {
        self.with_seq = true;
        self
    }

    fn render(&self, job: &Job) -> String {
        let mut line = String::new();
        if self.with_seq {
            line.push_str(&format!("{}: ", job.seq));
        }
        if !job.ts_text.is_empty() {
            line.push_str(&job.ts_text);
            line.push(' ');
        }
        if !job.cat.is_empty() {
            line.push_str(&job.cat);
            line.push(' ');
        }
        line.push_str(&job.msg);
        let site = caller_site_str(job, self.file_name_mode);
        if !site.is_empty() {
            line.push(' ');
            line.push_str(&site);
        }
        // site already shows the innermost frame, trail starts one further out
        let trail = job.path_str(self.file_name_mode, 1);
        if !trail.is_empty() {
            line.push(' ');
            line.push_str(&trail);
        }
        line.push('\n');
        line
    }
}

impl Writer for StdoutWriter {
    fn write_now(&mut self, job: &Job) -> Result<(), WriteError> {
        let line = self.render(job);
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(line.as_bytes())?;
        stdout.flush()?;
        self.line_count += 1;
        Ok(())
    }

    fn estimate_line_count(&self) -> u64 {
        self.line_count
    }

    fn close(&mut self) -> Result<(), WriteError> {
        std::io::stdout()
            .flush()
            .map_err(|e| WriteError::Close(e.to_string()))
    }

    fn set_file_name_mode(&mut self, mode: FileNameMode) {
        self.file_name_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotolog_core::callpath::CallSite;
    use rotolog_core::job::{ExtMap, JobData};

    fn job() -> Job {
        Job::new(
            JobData {
                seq: 9,
                pid: 1,
                tid: None,
                thread_name: "t".to_owned(),
                timestamp_ms: 0,
                msg: "ready".to_owned(),
                cat: "I".to_owned(),
                path: vec![
                    Some(CallSite {
                        file: "src/db.rs".to_owned(),
                        line: 12,
                    }),
                    Some(CallSite {
                        file: "src/app.rs".to_owned(),
                        line: 99,
                    }),
                ],
                stack_len: 2,
                caller_function: Some("connect".to_owned()),
                special: ExtMap::new(),
            },
            "13:59.59;042".to_owned(),
        )
    }

    #[test]
    fn compact_layout() {
        let writer = StdoutWriter::new(FileNameMode::Short);
        assert_eq!(
            writer.render(&job()),
            "13:59.59;042 I ready *db(12) |app(99)\n"
        );
    }

    #[test]
    fn seq_prefix_is_opt_in() {
        let writer = StdoutWriter::new(FileNameMode::Short).with_seq();
        assert!(writer.render(&job()).starts_with("9: "));
    }

    #[test]
    fn bare_job_renders_message_only() {
        let writer = StdoutWriter::new(FileNameMode::Short);
        let mut j = job();
        j.ts_text.clear();
        j.cat.clear();
        j.path.clear();
        assert_eq!(writer.render(&j), "ready\n");
    }
}
