//! Configuration — `rotolog.toml` parsing and runtime settings.
//!
//! [`RotologConfig`] is the top-level structure; each section maps to one
//! subsystem. Loading order:
//! 1. environment variables (`ROTOLOG_{SECTION}_{FIELD}`)
//! 2. config file (`rotolog.toml`)
//! 3. defaults (`Default` impls)
//!
//! All range checks happen in [`RotologConfig::validate`], so invalid
//! rotation parameters or capacities fail at setup time, not at log-call
//! time.

use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::callpath::FileNameMode;
use crate::error::{ConfigError, RotologError};

/// Convenience aliases for common timestamp formats.
///
/// `std1` renders like `13:59.59;999`, `std2` like `06/02 13:59.59`.
pub const TS_FORMAT_ALIASES: &[(&str, &str)] = &[
    ("std1", "%H:%M.%S;%3N"),
    ("std2", "%m/%d %H:%M.%S"),
];

/// Resolves a timestamp format alias; unknown values pass through unchanged.
pub fn resolve_ts_alias(format: &str) -> &str {
    TS_FORMAT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == format)
        .map(|(_, resolved)| *resolved)
        .unwrap_or(format)
}

/// Rotolog engine configuration, top-level structure of `rotolog.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotologConfig {
    /// Job pipeline settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Writer rotation settings
    #[serde(default)]
    pub rotation: RotationConfig,
    /// Call-path capture settings
    #[serde(default)]
    pub stack: StackConfig,
    /// Socket transport settings
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Job pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Capacity of the bounded job history visible to filters/observers
    pub history_capacity: usize,
    /// Timestamp format: `None` renders no timestamp text; strftime syntax
    /// with `%3N` as millisecond token; `std1`/`std2` aliases accepted
    pub ts_format: Option<String>,
    /// Call-site file-name rendering mode
    pub file_name_mode: FileNameMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            ts_format: None,
            file_name_mode: FileNameMode::Short,
        }
    }
}

/// Writer rotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Rotate once the current writer holds at least this many lines;
    /// `None` disables rotation
    pub line_min: Option<u64>,
    /// Number of writer configurations to cycle through
    pub count: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            line_min: Some(10_000),
            count: 3,
        }
    }
}

/// Call-path capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Capture call paths at all; disabling skips extraction entirely
    pub capture: bool,
    /// Maximum resolved entries per call path
    pub stack_max: usize,
    /// Innermost frames to skip permanently (wrapper functions etc.)
    pub trace_offset: usize,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            capture: true,
            stack_max: 1,
            trace_offset: 0,
        }
    }
}

/// Socket transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Listener bind address, e.g. "127.0.0.1:9801"
    pub bind_addr: String,
    /// Maximum frames buffered between connections and the drain worker
    pub queue_capacity: usize,
    /// Sleep between empty-queue polls of the drain worker (milliseconds)
    pub poll_interval_ms: u64,
    /// Stop the worker once every producer connection closed and the queue
    /// drained, even without an explicit stop request
    pub auto_stop: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9801".to_owned(),
            queue_capacity: 100_000,
            poll_interval_ms: 50,
            auto_stop: false,
        }
    }
}

impl RotologConfig {
    /// Loads a TOML file and applies environment overrides.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RotologError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RotologError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RotologError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RotologError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, RotologError> {
        toml::from_str(toml_str).map_err(|e| {
            RotologError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides settings from `ROTOLOG_{SECTION}_{FIELD}` variables.
    pub fn apply_env_overrides(&mut self) {
        override_usize(
            &mut self.server.history_capacity,
            "ROTOLOG_SERVER_HISTORY_CAPACITY",
        );
        if let Ok(v) = std::env::var("ROTOLOG_SERVER_TS_FORMAT") {
            self.server.ts_format = if v.is_empty() { None } else { Some(v) };
        }

        if let Ok(v) = std::env::var("ROTOLOG_ROTATION_LINE_MIN") {
            match v.parse::<u64>() {
                Ok(n) => self.rotation.line_min = Some(n),
                Err(_) if v == "disabled" => self.rotation.line_min = None,
                Err(_) => tracing::warn!(value = %v, "ignoring bad ROTOLOG_ROTATION_LINE_MIN"),
            }
        }
        override_usize(&mut self.rotation.count, "ROTOLOG_ROTATION_COUNT");

        override_bool(&mut self.stack.capture, "ROTOLOG_STACK_CAPTURE");
        override_usize(&mut self.stack.stack_max, "ROTOLOG_STACK_STACK_MAX");
        override_usize(&mut self.stack.trace_offset, "ROTOLOG_STACK_TRACE_OFFSET");

        override_string(&mut self.ingest.bind_addr, "ROTOLOG_INGEST_BIND_ADDR");
        override_usize(
            &mut self.ingest.queue_capacity,
            "ROTOLOG_INGEST_QUEUE_CAPACITY",
        );
        override_u64(
            &mut self.ingest.poll_interval_ms,
            "ROTOLOG_INGEST_POLL_INTERVAL_MS",
        );
        override_bool(&mut self.ingest.auto_stop, "ROTOLOG_INGEST_AUTO_STOP");
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.history_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.history_capacity".to_owned(),
                reason: "must be >= 1".to_owned(),
            });
        }

        if let Some(format) = self.server.ts_format.as_deref() {
            validate_ts_format(format)?;
        }

        if self.rotation.count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rotation.count".to_owned(),
                reason: "must be >= 1".to_owned(),
            });
        }

        if self.rotation.line_min == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "rotation.line_min".to_owned(),
                reason: "must be >= 1, or absent to disable rotation".to_owned(),
            });
        }

        if self.ingest.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.queue_capacity".to_owned(),
                reason: "must be >= 1".to_owned(),
            });
        }

        if self.ingest.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.poll_interval_ms".to_owned(),
                reason: "must be >= 1".to_owned(),
            });
        }

        Ok(())
    }
}

/// Checks that a timestamp format (alias or strftime string) is renderable.
pub fn validate_ts_format(format: &str) -> Result<(), ConfigError> {
    let resolved = resolve_ts_alias(format).replace("%3N", "");
    let bad = StrftimeItems::new(&resolved).any(|item| matches!(item, Item::Error));
    if bad {
        return Err(ConfigError::InvalidValue {
            field: "server.ts_format".to_owned(),
            reason: format!("'{format}' is not a valid strftime format"),
        });
    }
    Ok(())
}

fn override_string(target: &mut String, key: &str) {
    if let Ok(v) = std::env::var(key) {
        *target = v;
    }
}

fn override_usize(target: &mut usize, key: &str) {
    if let Ok(v) = std::env::var(key) {
        match v.parse() {
            Ok(n) => *target = n,
            Err(_) => tracing::warn!(key, value = %v, "ignoring non-numeric override"),
        }
    }
}

fn override_u64(target: &mut u64, key: &str) {
    if let Ok(v) = std::env::var(key) {
        match v.parse() {
            Ok(n) => *target = n,
            Err(_) => tracing::warn!(key, value = %v, "ignoring non-numeric override"),
        }
    }
}

fn override_bool(target: &mut bool, key: &str) {
    if let Ok(v) = std::env::var(key) {
        match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => *target = true,
            "0" | "false" | "no" => *target = false,
            _ => tracing::warn!(key, value = %v, "ignoring non-boolean override"),
        }
    }
}
