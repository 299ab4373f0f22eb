//! Writer backends.
//!
//! Every backend implements [`rotolog_core::writer::Writer`] and is produced
//! through a [`rotolog_core::writer::WriterFactory`], so any of them can sit
//! behind the rotating writer.

pub mod console;
pub mod file;
pub mod memory;

pub use console::StdoutWriter;
pub use file::{FileWriter, FileWriterFactory, numbered_file_configs};
pub use memory::{MemoryFactory, MemorySink, MemoryWriter};
