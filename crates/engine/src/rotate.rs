//! Writer rotation — cycles through a fixed set of writer configurations.
//!
//! [`RotatingWriter`] owns an ordered, cyclic list of [`WriterConfig`]s and a
//! history of live writers (oldest first, capped at the config-set size). On
//! each write it checks the current writer's estimated line count against the
//! threshold and rotates *before* writing when the threshold is reached.
//!
//! Rotation is not safe for concurrent invocation; the owning server
//! serializes calls to one instance.

use metrics::counter;
use tracing::debug;

use rotolog_core::callpath::FileNameMode;
use rotolog_core::error::{ConfigError, WriteError};
use rotolog_core::job::Job;
use rotolog_core::metrics::ROTATIONS_TOTAL;
use rotolog_core::writer::{Writer, WriterConfig, WriterFactory};

use crate::error::EngineError;

/// Iterates through a fixed config list, wrapping back to the first element.
struct ConfigRotator {
    configs: Vec<WriterConfig>,
    next: usize,
}

impl ConfigRotator {
    fn new(configs: Vec<WriterConfig>) -> Self {
        Self { configs, next: 0 }
    }

    fn len(&self) -> usize {
        self.configs.len()
    }

    fn next(&mut self) -> WriterConfig {
        let config = self.configs[self.next].clone();
        self.next = (self.next + 1) % self.configs.len();
        config
    }
}

/// Rotating writer: replaces the active writer with a new one, cycling
/// through the config set, once the line-count threshold is reached.
pub struct RotatingWriter {
    rotator: ConfigRotator,
    factory: Box<dyn WriterFactory>,
    /// `None` disables rotation entirely
    rotate_line_min: Option<u64>,
    /// Live writers, oldest at [0], current at the end
    history: Vec<Box<dyn Writer>>,
    /// Rendering mode pushed by the owning server; applied to every writer
    /// this rotation creates
    file_name_mode: Option<FileNameMode>,
}

impl RotatingWriter {
    /// Builds the rotating writer and opens the first underlying writer.
    ///
    /// Fails fast on invalid rotation parameters: the config set must not be
    /// empty, and appending to an existing target (`drop_existing == false`)
    /// is only coherent with a single config.
    pub fn new(
        configs: Vec<WriterConfig>,
        factory: impl WriterFactory + 'static,
        rotate_line_min: Option<u64>,
    ) -> Result<Self, EngineError> {
        if configs.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rotation.count".to_owned(),
                reason: "need at least one writer config".to_owned(),
            }
            .into());
        }
        if configs.iter().any(|c| !c.drop_existing) && configs.len() != 1 {
            return Err(ConfigError::InvalidValue {
                field: "rotation.count".to_owned(),
                reason: "appending to an existing target requires exactly one config".to_owned(),
            }
            .into());
        }
        if rotate_line_min == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "rotation.line_min".to_owned(),
                reason: "must be >= 1, or None to disable rotation".to_owned(),
            }
            .into());
        }

        let mut rotating = Self {
            rotator: ConfigRotator::new(configs),
            factory: Box::new(factory),
            rotate_line_min,
            history: Vec::new(),
            file_name_mode: None,
        };
        rotating.rotate()?;
        Ok(rotating)
    }

    /// Live writers, oldest first. Never empty after construction.
    pub fn writers(&self) -> &[Box<dyn Writer>] {
        &self.history
    }

    /// Retires the current writer and opens the next config's writer.
    ///
    /// The oldest history entry is evicted before the new writer is created,
    /// so the factory only ever sees still-valid siblings.
    fn rotate(&mut self) -> Result<(), WriteError> {
        if self.history.len() >= self.rotator.len() {
            // evicted writer was closed when it stopped being current
            self.history.remove(0);
        }

        let config = self.rotator.next();
        debug!(target_name = %config.target, "rotating to next writer config");
        let mut writer = self.factory.create(&config, &self.history)?;
        if let Some(mode) = self.file_name_mode {
            writer.set_file_name_mode(mode);
        }

        if let Some(current) = self.history.last_mut() {
            current.close()?;
        }
        self.history.push(writer);
        counter!(ROTATIONS_TOTAL).increment(1);
        Ok(())
    }
}

impl Writer for RotatingWriter {
    /// Checks the threshold once, rotates if reached, then writes the job to
    /// the current writer. Bursts may overshoot the threshold by at most one
    /// write.
    fn write_now(&mut self, job: &Job) -> Result<(), WriteError> {
        let due = match (self.rotate_line_min, self.history.last()) {
            (Some(min), Some(current)) => current.estimate_line_count() >= min,
            _ => false,
        };
        if due {
            self.rotate()?;
        }

        match self.history.last_mut() {
            Some(current) => current.write_now(job),
            None => Err(WriteError::Persist("no writer available".to_owned())),
        }
    }

    fn estimate_line_count(&self) -> u64 {
        self.history
            .last()
            .map(|w| w.estimate_line_count())
            .unwrap_or(0)
    }

    fn close(&mut self) -> Result<(), WriteError> {
        match self.history.last_mut() {
            Some(current) => current.close(),
            None => Ok(()),
        }
    }

    fn set_file_name_mode(&mut self, mode: FileNameMode) {
        self.file_name_mode = Some(mode);
        for writer in &mut self.history {
            writer.set_file_name_mode(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::memory::MemoryFactory;
    use rotolog_core::callpath::{CallPath, CallSite};
    use rotolog_core::job::{ExtMap, JobData};

    fn job(msg: &str) -> Job {
        Job::new(
            JobData {
                seq: 1,
                pid: 1,
                tid: None,
                thread_name: "t".to_owned(),
                timestamp_ms: 0,
                msg: msg.to_owned(),
                cat: String::new(),
                path: CallPath::new(),
                stack_len: 0,
                caller_function: None,
                special: ExtMap::new(),
            },
            String::new(),
        )
    }

    fn configs(n: usize) -> Vec<WriterConfig> {
        (0..n)
            .map(|i| WriterConfig::new(format!("target_{i}")))
            .collect()
    }

    #[test]
    fn rejects_empty_config_set() {
        let factory = MemoryFactory::new();
        assert!(RotatingWriter::new(Vec::new(), factory, Some(1)).is_err());
    }

    #[test]
    fn rejects_append_mode_with_multiple_configs() {
        let factory = MemoryFactory::new();
        let configs = vec![
            WriterConfig::append("a"),
            WriterConfig::new("b"),
        ];
        assert!(RotatingWriter::new(configs, factory, Some(1)).is_err());
    }

    #[test]
    fn append_mode_with_single_config_is_fine() {
        let factory = MemoryFactory::new();
        RotatingWriter::new(vec![WriterConfig::append("a")], factory, None).unwrap();
    }

    #[test]
    fn single_config_recreates_same_target() {
        let factory = MemoryFactory::new();
        let handle = factory.clone();
        let mut rotating = RotatingWriter::new(configs(1), factory, Some(1)).unwrap();

        rotating.write_now(&job("msg<0>")).unwrap();
        rotating.write_now(&job("msg<1>")).unwrap();

        let created = handle.created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].config, created[1].config);
        assert_eq!(created[0].lines().len(), 1);
        assert_eq!(created[1].lines().len(), 1);
        assert!(created[0].lines()[0].contains("msg<0>"));
        assert!(created[1].lines()[0].contains("msg<1>"));
    }

    #[test]
    fn threshold_two_splits_three_writes() {
        let factory = MemoryFactory::new();
        let handle = factory.clone();
        let mut rotating = RotatingWriter::new(configs(1), factory, Some(2)).unwrap();
        for i in 0..3 {
            rotating.write_now(&job(&format!("msg<{i}>"))).unwrap();
        }
        let created = handle.created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].lines().len(), 2);
        assert_eq!(created[1].lines().len(), 1);
    }

    #[test]
    fn history_is_capped_at_config_count() {
        let factory = MemoryFactory::new();
        let handle = factory.clone();
        let mut rotating = RotatingWriter::new(configs(2), factory, Some(1)).unwrap();
        for i in 0..5 {
            rotating.write_now(&job(&format!("m{i}"))).unwrap();
        }
        assert_eq!(rotating.writers().len(), 2);
        // every write after the first triggered a rotation
        assert_eq!(handle.created().len(), 5);
    }

    #[test]
    fn no_rotation_when_disabled() {
        let factory = MemoryFactory::new();
        let handle = factory.clone();
        let mut rotating = RotatingWriter::new(configs(3), factory, None).unwrap();
        for i in 0..77 {
            rotating.write_now(&job(&format!("m{i}"))).unwrap();
        }
        let created = handle.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].lines().len(), 77);
    }

    #[test]
    fn file_name_mode_applies_to_current_and_future_writers() {
        let factory = MemoryFactory::new();
        let handle = factory.clone();
        let mut rotating = RotatingWriter::new(configs(1), factory, Some(1)).unwrap();
        rotating.set_file_name_mode(FileNameMode::Full);

        let mut j = job("m");
        j.path = vec![Some(CallSite {
            file: "src/app/db.rs".to_owned(),
            line: 7,
        })];
        rotating.write_now(&j).unwrap();
        // second write rotates onto a freshly created writer
        rotating.write_now(&j).unwrap();

        let created = handle.created();
        assert_eq!(created.len(), 2);
        assert!(created[0].lines()[0].contains("|src_app_db-rs(7)"));
        assert!(created[1].lines()[0].contains("|src_app_db-rs(7)"));
    }

    #[test]
    fn configs_cycle_in_order() {
        let factory = MemoryFactory::new();
        let handle = factory.clone();
        let mut rotating = RotatingWriter::new(configs(2), factory, Some(1)).unwrap();
        for i in 0..4 {
            rotating.write_now(&job(&format!("m{i}"))).unwrap();
        }
        let targets: Vec<String> = handle
            .created()
            .iter()
            .map(|sink| sink.config.target.clone())
            .collect();
        assert_eq!(targets, ["target_0", "target_1", "target_0", "target_1"]);
    }
}
