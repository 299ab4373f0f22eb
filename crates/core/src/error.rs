//! Error types — domain errors shared across the workspace.
//!
//! [`RotologError`] is the top-level error. Each sub-enum covers one failure
//! class so that callers can match on the class without string inspection.

/// Rotolog top-level error type
#[derive(Debug, thiserror::Error)]
pub enum RotologError {
    /// Configuration error, raised at setup time
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Writer backend error, raised while persisting a job
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// Socket transport error
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
///
/// These fail fast at setup time, never at log-call time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be found
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A config value is outside its valid range
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A filter or observer with the same name is already registered
    #[error("duplicate {kind} stage: '{name}' is already registered")]
    DuplicateStage { kind: &'static str, name: String },
}

/// Writer backend errors
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The backend target could not be opened or created
    #[error("cannot open writer target '{target}': {reason}")]
    Open { target: String, reason: String },

    /// Persisting a single job failed
    #[error("write failed: {0}")]
    Persist(String),

    /// Releasing backend resources failed
    #[error("close failed: {0}")]
    Close(String),

    /// I/O error from the backend
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "rotation.count".to_owned(),
            reason: "must be >= 1".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rotation.count"));
        assert!(msg.contains(">= 1"));
    }

    #[test]
    fn duplicate_stage_display() {
        let err = ConfigError::DuplicateStage {
            kind: "observer",
            name: "mail-digest".to_owned(),
        };
        assert!(err.to_string().contains("mail-digest"));
        assert!(err.to_string().contains("observer"));
    }

    #[test]
    fn write_error_converts_to_top_level() {
        let err = WriteError::Persist("disk full".to_owned());
        let top: RotologError = err.into();
        assert!(matches!(top, RotologError::Write(_)));
    }
}
