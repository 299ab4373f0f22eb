//! Writer contract — the seam between the pipeline and persistence backends.
//!
//! Concrete backends (file, stdout, in-memory, relational) live outside the
//! core; they only implement [`Writer`] and are produced by a
//! [`WriterFactory`] from a [`WriterConfig`].

use crate::callpath::FileNameMode;
use crate::error::WriteError;
use crate::job::Job;

/// Immutable description of one persistence target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Backend-specific target: a file path, a table name, ...
    pub target: String,
    /// Recreate the target on open instead of appending to it
    pub drop_existing: bool,
}

impl WriterConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            drop_existing: true,
        }
    }

    pub fn append(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            drop_existing: false,
        }
    }
}

/// A backend-specific sink persisting one job at a time.
pub trait Writer: Send {
    /// Persists the job, returning only after the backend acknowledged the
    /// write (or failed).
    fn write_now(&mut self, job: &Job) -> Result<(), WriteError>;

    /// Count of lines persisted so far. An approximation is acceptable.
    fn estimate_line_count(&self) -> u64;

    /// Releases backend resources. Called once per writer lifetime.
    fn close(&mut self) -> Result<(), WriteError>;

    /// Adopts the owning server's file-name rendering mode.
    ///
    /// The server pushes its configured mode into its writer at build time so
    /// that one setting governs every rendered line. Writers with a fixed
    /// custom layout ignore the call.
    fn set_file_name_mode(&mut self, _mode: FileNameMode) {}
}

/// Builds writers for a rotation slot.
///
/// The factory also receives the current writer history, for the rare
/// backend that needs awareness of its still-live siblings.
pub trait WriterFactory: Send {
    fn create(
        &mut self,
        config: &WriterConfig,
        history: &[Box<dyn Writer>],
    ) -> Result<Box<dyn Writer>, WriteError>;
}

impl<F> WriterFactory for F
where
    F: FnMut(&WriterConfig, &[Box<dyn Writer>]) -> Result<Box<dyn Writer>, WriteError> + Send,
{
    fn create(
        &mut self,
        config: &WriterConfig,
        history: &[Box<dyn Writer>],
    ) -> Result<Box<dyn Writer>, WriteError> {
        self(config, history)
    }
}
