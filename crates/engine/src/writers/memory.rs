//! In-memory writer backend.
//!
//! Keeps lines in a shared buffer that stays inspectable after the writer has
//! been handed to a server or rotation slot. Used by tests throughout the
//! workspace and handy for capturing log output in embedded scenarios.

use std::sync::{Arc, Mutex};

use rotolog_core::callpath::FileNameMode;
use rotolog_core::error::WriteError;
use rotolog_core::job::Job;
use rotolog_core::writer::{Writer, WriterConfig, WriterFactory};

use crate::format::{FormatLine, LineLayout};

fn lock_lines(lines: &Mutex<Vec<String>>) -> std::sync::MutexGuard<'_, Vec<String>> {
    lines.lock().unwrap_or_else(|e| e.into_inner())
}

/// Shared view into a memory writer's buffer.
///
/// Cloneable; stays valid after the writer itself moved into a pipeline.
#[derive(Clone)]
pub struct MemorySink {
    /// The config the writer was created from
    pub config: WriterConfig,
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Snapshot of the buffered lines, without trailing newlines.
    pub fn lines(&self) -> Vec<String> {
        lock_lines(&self.lines).clone()
    }

    pub fn len(&self) -> usize {
        lock_lines(&self.lines).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_lines(&self.lines).is_empty()
    }
}

/// Writer that appends rendered lines to a shared in-memory buffer.
pub struct MemoryWriter {
    sink: MemorySink,
    layout: LineLayout,
    closed: bool,
}

impl MemoryWriter {
    pub fn new(config: WriterConfig, format: FormatLine) -> Self {
        Self::with_layout(config, LineLayout::Custom(format))
    }

    fn with_layout(config: WriterConfig, layout: LineLayout) -> Self {
        Self {
            sink: MemorySink {
                config,
                lines: Arc::new(Mutex::new(Vec::new())),
            },
            layout,
            closed: false,
        }
    }

    /// Memory writer with the default text layout.
    pub fn formatted(config: WriterConfig) -> Self {
        Self::with_layout(config, LineLayout::text())
    }

    /// Memory writer that records only the message of each job.
    pub fn plain() -> Self {
        Self::new(
            WriterConfig::new("memory"),
            Box::new(|job, _line_no| format!("{}\n", job.msg)),
        )
    }

    /// Handle onto the buffer, for inspection after the writer moved away.
    pub fn sink(&self) -> MemorySink {
        self.sink.clone()
    }
}

impl Writer for MemoryWriter {
    fn write_now(&mut self, job: &Job) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::Persist("memory writer is closed".to_owned()));
        }
        let mut lines = lock_lines(&self.sink.lines);
        let line_no = lines.len() as u64 + 1;
        let line = self.layout.render(job, line_no);
        lines.push(line.trim_end_matches('\n').to_owned());
        Ok(())
    }

    fn estimate_line_count(&self) -> u64 {
        self.sink.len() as u64
    }

    fn close(&mut self) -> Result<(), WriteError> {
        self.closed = true;
        Ok(())
    }

    fn set_file_name_mode(&mut self, mode: FileNameMode) {
        self.layout.set_file_name_mode(mode);
    }
}

/// Factory producing memory writers and remembering every sink it handed out.
#[derive(Clone, Default)]
pub struct MemoryFactory {
    created: Arc<Mutex<Vec<MemorySink>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sinks of all writers created so far, in creation order.
    pub fn created(&self) -> Vec<MemorySink> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl WriterFactory for MemoryFactory {
    fn create(
        &mut self,
        config: &WriterConfig,
        _history: &[Box<dyn Writer>],
    ) -> Result<Box<dyn Writer>, WriteError> {
        let writer = MemoryWriter::formatted(config.clone());
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(writer.sink());
        Ok(Box::new(writer))
    }
}
