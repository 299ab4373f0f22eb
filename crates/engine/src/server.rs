//! Log server — the pipeline orchestrator.
//!
//! One [`LogServer`] owns a bounded [`JobHistory`], a writer, a filter chain
//! and an observer chain. [`LogServer::submit`] is the single entry point:
//! materialize the job, run filters, write, run observers. The server can be
//! in the producing process or behind the socket transport; either way one
//! feeding thread/task serializes `submit` calls per instance.

use std::collections::VecDeque;

use metrics::counter;
use tracing::warn;
use uuid::Uuid;

use rotolog_core::callpath::FileNameMode;
use rotolog_core::config::{ServerConfig, resolve_ts_alias, validate_ts_format};
use rotolog_core::error::ConfigError;
use rotolog_core::job::{Job, JobData};
use rotolog_core::metrics::{JOBS_SUBMITTED_TOTAL, LABEL_STAGE_KIND, STAGE_ERRORS_TOTAL};
use rotolog_core::writer::Writer;

use crate::error::EngineError;
use crate::format::render_timestamp;

/// Error raised by a filter or observer. Always caught by the server.
pub type StageError = Box<dyn std::error::Error + Send + Sync>;

/// One pipeline stage, usable as filter (before the write, may mutate the
/// latest job) or observer (after the write).
///
/// The same interface serves both chains; registration order is invocation
/// order, and names must be unique within a chain.
pub trait Stage: Send {
    /// Stable stage name; duplicates are rejected at registration.
    fn name(&self) -> &str;

    /// Runs the stage over the history (latest job last) and the active
    /// writer. Errors are logged by the server and never propagate.
    fn run(&mut self, history: &mut JobHistory, writer: &mut dyn Writer)
    -> Result<(), StageError>;
}

/// Adapts a closure into a named [`Stage`].
pub struct FnStage<F> {
    name: String,
    f: F,
}

impl<F> FnStage<F>
where
    F: FnMut(&mut JobHistory, &mut dyn Writer) -> Result<(), StageError> + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Stage for FnStage<F>
where
    F: FnMut(&mut JobHistory, &mut dyn Writer) -> Result<(), StageError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &mut self,
        history: &mut JobHistory,
        writer: &mut dyn Writer,
    ) -> Result<(), StageError> {
        (self.f)(history, writer)
    }
}

/// Bounded job history, an arena of recycled slots.
///
/// The oldest slot is reinitialized in place once capacity is reached; a job
/// reference is only valid within one stage invocation.
pub struct JobHistory {
    slots: VecDeque<Job>,
    capacity: usize,
}

impl JobHistory {
    /// `capacity` must be >= 1; validated by the server builder.
    fn new(capacity: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
        }
    }

    /// Admits a new job, recycling the oldest slot at capacity.
    fn admit(&mut self, data: JobData, ts_text: String) {
        if self.slots.len() >= self.capacity {
            if let Some(mut job) = self.slots.pop_front() {
                job.reinit(data, ts_text);
                self.slots.push_back(job);
                return;
            }
        }
        self.slots.push_back(Job::new(data, ts_text));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs oldest first, the latest at the end.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Job> {
        self.slots.get(index)
    }

    /// The job being processed by the current `submit` call.
    pub fn latest(&self) -> Option<&Job> {
        self.slots.back()
    }

    pub fn latest_mut(&mut self) -> Option<&mut Job> {
        self.slots.back_mut()
    }
}

/// The seam between producers and servers.
///
/// Implemented by [`LogServer`] for in-process use and by the socket client
/// for remote use.
pub trait LogTarget: Send {
    /// Delivers one raw job record.
    fn log(&mut self, data: JobData) -> Result<(), EngineError>;

    /// Registers a producer; the returned id is only a connectivity probe.
    fn add_client(&mut self) -> Result<String, EngineError>;
}

/// Pipeline orchestrator; see the module docs.
pub struct LogServer {
    writer: Box<dyn Writer>,
    filters: Vec<Box<dyn Stage>>,
    observers: Vec<Box<dyn Stage>>,
    history: JobHistory,
    /// Alias-resolved timestamp format; `None` renders no timestamp text
    ts_format: Option<String>,
    file_name_mode: FileNameMode,
}

impl LogServer {
    pub fn builder(writer: impl Writer + 'static) -> LogServerBuilder {
        LogServerBuilder::new(writer)
    }

    /// Runs one job through the pipeline: materialize, filter, write,
    /// observe.
    ///
    /// Filter and observer failures are logged and swallowed; a writer
    /// failure propagates to the caller.
    pub fn submit(&mut self, data: JobData) -> Result<(), EngineError> {
        counter!(JOBS_SUBMITTED_TOTAL).increment(1);
        let ts_text = render_timestamp(data.timestamp_ms, self.ts_format.as_deref());
        self.history.admit(data, ts_text);

        let LogServer {
            writer,
            filters,
            observers,
            history,
            ..
        } = self;

        run_chain("filter", filters, history, writer.as_mut());

        if let Some(job) = history.latest() {
            writer.write_now(job)?;
        }

        run_chain("observer", observers, history, writer.as_mut());
        Ok(())
    }

    /// Appends an observer; a duplicate name fails explicitly.
    pub fn add_observer(&mut self, observer: Box<dyn Stage>) -> Result<(), ConfigError> {
        ensure_unique("observer", &self.observers, observer.name())?;
        self.observers.push(observer);
        Ok(())
    }

    pub fn history(&self) -> &JobHistory {
        &self.history
    }

    pub fn writer(&self) -> &dyn Writer {
        self.writer.as_ref()
    }

    pub fn file_name_mode(&self) -> FileNameMode {
        self.file_name_mode
    }

    /// Closes the underlying writer.
    pub fn close(&mut self) -> Result<(), EngineError> {
        self.writer.close()?;
        Ok(())
    }
}

impl LogTarget for LogServer {
    fn log(&mut self, data: JobData) -> Result<(), EngineError> {
        self.submit(data)
    }

    fn add_client(&mut self) -> Result<String, EngineError> {
        Ok(Uuid::new_v4().to_string())
    }
}

fn run_chain(
    kind: &'static str,
    stages: &mut [Box<dyn Stage>],
    history: &mut JobHistory,
    writer: &mut dyn Writer,
) {
    for stage in stages.iter_mut() {
        if let Err(e) = stage.run(history, writer) {
            counter!(STAGE_ERRORS_TOTAL, LABEL_STAGE_KIND => kind).increment(1);
            let job = history.latest().map(|j| j.to_string()).unwrap_or_default();
            warn!(kind, stage = stage.name(), error = %e, %job, "stage failed; chain continues");
        }
    }
}

fn ensure_unique(
    kind: &'static str,
    stages: &[Box<dyn Stage>],
    name: &str,
) -> Result<(), ConfigError> {
    if stages.iter().any(|s| s.name() == name) {
        return Err(ConfigError::DuplicateStage {
            kind,
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Builder for [`LogServer`]; validates the whole setup on `build`.
pub struct LogServerBuilder {
    writer: Box<dyn Writer>,
    filters: Vec<Box<dyn Stage>>,
    observers: Vec<Box<dyn Stage>>,
    history_capacity: usize,
    ts_format: Option<String>,
    file_name_mode: FileNameMode,
    duplicate: Option<ConfigError>,
}

impl LogServerBuilder {
    pub fn new(writer: impl Writer + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            filters: Vec::new(),
            observers: Vec::new(),
            history_capacity: 100,
            ts_format: None,
            file_name_mode: FileNameMode::Short,
            duplicate: None,
        }
    }

    /// Applies the `[server]` section of the engine configuration.
    pub fn config(mut self, config: &ServerConfig) -> Self {
        self.history_capacity = config.history_capacity;
        self.ts_format = config.ts_format.clone();
        self.file_name_mode = config.file_name_mode;
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Timestamp format (strftime with `%3N` millisecond token, or the
    /// `std1`/`std2` aliases); `None` disables timestamp text.
    pub fn ts_format(mut self, format: Option<impl Into<String>>) -> Self {
        self.ts_format = format.map(Into::into);
        self
    }

    /// File-name rendering mode for call sites; pushed into the writer's
    /// default line layout on `build`, so one setting governs every line the
    /// server renders or persists.
    pub fn file_name_mode(mut self, mode: FileNameMode) -> Self {
        self.file_name_mode = mode;
        self
    }

    pub fn filter(mut self, filter: impl Stage + 'static) -> Self {
        if let Err(e) = ensure_unique("filter", &self.filters, filter.name()) {
            self.duplicate.get_or_insert(e);
        }
        self.filters.push(Box::new(filter));
        self
    }

    pub fn observer(mut self, observer: impl Stage + 'static) -> Self {
        if let Err(e) = ensure_unique("observer", &self.observers, observer.name()) {
            self.duplicate.get_or_insert(e);
        }
        self.observers.push(Box::new(observer));
        self
    }

    pub fn build(self) -> Result<LogServer, EngineError> {
        if let Some(duplicate) = self.duplicate {
            return Err(duplicate.into());
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.history_capacity".to_owned(),
                reason: "must be >= 1".to_owned(),
            }
            .into());
        }
        let ts_format = match self.ts_format.as_deref() {
            Some(format) => {
                validate_ts_format(format)?;
                Some(resolve_ts_alias(format).to_owned())
            }
            None => None,
        };

        let mut writer = self.writer;
        writer.set_file_name_mode(self.file_name_mode);

        Ok(LogServer {
            writer,
            filters: self.filters,
            observers: self.observers,
            history: JobHistory::new(self.history_capacity),
            ts_format,
            file_name_mode: self.file_name_mode,
        })
    }
}
