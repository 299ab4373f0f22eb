//! Engine error type.
//!
//! [`EngineError`] covers everything that can go wrong inside the pipeline
//! and transport. A `From<EngineError> for RotologError` bridge lets callers
//! propagate with `?` into the workspace-level error.

use rotolog_core::error::{ConfigError, RotologError, WriteError};

/// Pipeline and transport errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid setup (rotation parameters, duplicate stages, bad formats)
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Writer backend failure while persisting a job
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// Wire payload could not be (de)serialized
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Socket transport failure
    #[error("transport error: {context}: {reason}")]
    Transport { context: &'static str, reason: String },

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn transport(context: &'static str, reason: impl ToString) -> Self {
        EngineError::Transport {
            context,
            reason: reason.to_string(),
        }
    }
}

impl From<EngineError> for RotologError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Config(e) => RotologError::Config(e),
            EngineError::Write(e) => RotologError::Write(e),
            EngineError::Io(e) => RotologError::Io(e),
            EngineError::Serialize(e) => RotologError::Transport(e.to_string()),
            EngineError::Transport { .. } => RotologError::Transport(err.to_string()),
        }
    }
}
