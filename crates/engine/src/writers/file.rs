//! Plain-text file writer backend.
//!
//! Opens its target lazily on the first write. A dropping config truncates
//! the file; an appending config keeps it and resumes the line count from the
//! existing content, so rotation thresholds stay meaningful across restarts.
//! Every line is flushed individually; a log line that was acknowledged is on
//! disk.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write as _};

use tracing::debug;

use rotolog_core::callpath::FileNameMode;
use rotolog_core::error::WriteError;
use rotolog_core::job::Job;
use rotolog_core::writer::{Writer, WriterConfig, WriterFactory};

use crate::format::{FormatLine, LineLayout};

/// Expands a `{}` placeholder into the rotation slot number, producing the
/// config set for a numbered file rotation (`app_0.log`, `app_1.log`, ...).
///
/// A pattern without placeholder yields a single appending config, matching
/// the one-target-no-drop rotation rule.
pub fn numbered_file_configs(pattern: &str, count: usize) -> Vec<WriterConfig> {
    if !pattern.contains("{}") {
        return vec![WriterConfig::append(pattern)];
    }
    (0..count.max(1))
        .map(|i| WriterConfig::new(pattern.replace("{}", &i.to_string())))
        .collect()
}

/// Writer appending rendered lines to a text file.
pub struct FileWriter {
    config: WriterConfig,
    layout: LineLayout,
    file: Option<File>,
    line_count: u64,
}

impl FileWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            layout: LineLayout::text(),
            file: None,
            line_count: 0,
        }
    }

    pub fn with_format(config: WriterConfig, format: FormatLine) -> Self {
        Self {
            config,
            layout: LineLayout::Custom(format),
            file: None,
            line_count: 0,
        }
    }

    fn open(&mut self) -> Result<(), WriteError> {
        if self.config.drop_existing {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.config.target)
                .map_err(|e| open_error(&self.config.target, e))?;
            self.file = Some(file);
            self.line_count = 0;
        } else {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.config.target)
                .map_err(|e| open_error(&self.config.target, e))?;
            self.line_count = count_lines(&self.config.target)?;
            self.file = Some(file);
        }
        debug!(
            target_name = %self.config.target,
            drop_existing = self.config.drop_existing,
            resumed_lines = self.line_count,
            "opened file writer target"
        );
        Ok(())
    }
}

fn open_error(target: &str, e: std::io::Error) -> WriteError {
    WriteError::Open {
        target: target.to_owned(),
        reason: e.to_string(),
    }
}

fn count_lines(target: &str) -> Result<u64, WriteError> {
    match File::open(target) {
        Ok(file) => {
            let mut count = 0u64;
            for line in BufReader::new(file).lines() {
                line.map_err(|e| open_error(target, e))?;
                count += 1;
            }
            Ok(count)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(open_error(target, e)),
    }
}

impl Writer for FileWriter {
    fn write_now(&mut self, job: &Job) -> Result<(), WriteError> {
        if self.file.is_none() {
            self.open()?;
        }
        let line = self.layout.render(job, self.line_count + 1);
        // open() ran just above when the handle was missing
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WriteError::Persist("file writer has no open handle".to_owned()))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        self.line_count += 1;
        Ok(())
    }

    fn estimate_line_count(&self) -> u64 {
        self.line_count
    }

    fn close(&mut self) -> Result<(), WriteError> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| WriteError::Close(e.to_string()))?;
        }
        Ok(())
    }

    fn set_file_name_mode(&mut self, mode: FileNameMode) {
        self.layout.set_file_name_mode(mode);
    }
}

/// Factory producing [`FileWriter`]s, one rendering layout for all slots.
pub struct FileWriterFactory {
    layout: Box<dyn Fn() -> LineLayout + Send>,
}

impl FileWriterFactory {
    /// Factory with the default text layout.
    pub fn new() -> Self {
        Self {
            layout: Box::new(LineLayout::text),
        }
    }

    /// Factory with a custom layout, instantiated per created writer.
    pub fn with_format(format: impl Fn() -> FormatLine + Send + 'static) -> Self {
        Self {
            layout: Box::new(move || LineLayout::Custom(format())),
        }
    }
}

impl Default for FileWriterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterFactory for FileWriterFactory {
    fn create(
        &mut self,
        config: &WriterConfig,
        _history: &[Box<dyn Writer>],
    ) -> Result<Box<dyn Writer>, WriteError> {
        let mut writer = FileWriter::new(config.clone());
        writer.layout = (self.layout)();
        Ok(Box::new(writer))
    }
}
