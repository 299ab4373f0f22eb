#![doc = include_str!("../README.md")]

pub mod callpath;
pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod writer;

// --- primary type re-exports ---

// errors
pub use error::{ConfigError, RotologError, WriteError};

// configuration
pub use config::{IngestConfig, RotationConfig, RotologConfig, ServerConfig, StackConfig};

// call paths
pub use callpath::{CallPath, CallPathExtractor, CallSite, FileNameMode, StackFrame};

// jobs
pub use job::{ExtMap, ExtValue, Job, JobData};

// writer contract
pub use writer::{Writer, WriterConfig, WriterFactory};
