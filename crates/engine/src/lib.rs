#![doc = include_str!("../README.md")]

pub mod error;
pub mod format;
pub mod log;
pub mod rotate;
pub mod server;
pub mod stages;
pub mod transport;
pub mod writers;

// --- primary type re-exports ---

// errors
pub use error::EngineError;

// pipeline
pub use server::{FnStage, JobHistory, LogServer, LogServerBuilder, LogTarget, Stage, StageError};
pub use stages::StackIndent;

// rotation
pub use rotate::RotatingWriter;

// producers
pub use log::{CategoryGate, ErrorPolicy, Log, LogBuilder, LogCall};

// rendering
pub use format::{FormatLine, LineLayout, TextFormatter};

// transport
pub use transport::{IngestQueue, SocketIngest, SocketTarget};

// writer backends
pub use writers::{FileWriter, FileWriterFactory, MemoryFactory, MemorySink, MemoryWriter, StdoutWriter};
