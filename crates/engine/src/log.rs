//! Producer front-end.
//!
//! [`Log`] is the runtime interface for application code: it numbers jobs,
//! extracts the call path from caller-captured frames, applies category
//! gating and sticky extension items, and hands the raw record to its
//! [`LogTarget`]: a local [`LogServer`](crate::server::LogServer) or the
//! socket client. An [`ErrorPolicy`] decides what a delivery failure does to
//! the calling application.

use std::collections::BTreeSet;

use chrono::Utc;

use rotolog_core::callpath::{CallPathExtractor, StackFrame};
use rotolog_core::config::StackConfig;
use rotolog_core::error::ConfigError;
use rotolog_core::job::{ExtMap, JobData};

use crate::error::EngineError;
use crate::server::LogTarget;

/// What a `Log` does when its target fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Surface the failure to the caller of `log`
    #[default]
    Propagate,
    /// Swallow silently (not recommended, but better than aborting)
    Silent,
    /// Report to standard output, then swallow
    Stdout,
    /// Report to standard error, then swallow
    Stderr,
}

/// Category admission: either everything, an allow-list, or a deny-list.
///
/// Enable and disable lists are mutually exclusive by construction. The
/// empty category "" is a normal value and may appear in either list.
#[derive(Debug, Clone, Default)]
pub enum CategoryGate {
    #[default]
    All,
    Enable(BTreeSet<String>),
    Disable(BTreeSet<String>),
}

impl CategoryGate {
    pub fn enable<I, S>(cats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategoryGate::Enable(cats.into_iter().map(Into::into).collect())
    }

    pub fn disable<I, S>(cats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategoryGate::Disable(cats.into_iter().map(Into::into).collect())
    }

    pub fn admits(&self, cat: &str) -> bool {
        match self {
            CategoryGate::All => true,
            CategoryGate::Enable(cats) => cats.contains(cat),
            CategoryGate::Disable(cats) => !cats.contains(cat),
        }
    }
}

/// Per-call options of [`Log::log_with`].
#[derive(Debug, Clone, Default)]
pub struct LogCall {
    /// Category tag; "" is the default/uncategorized value
    pub cat: String,
    /// Extension items for this call (override sticky items on key clash)
    pub special: ExtMap,
    /// Extra innermost frames to skip for this call only
    pub trace_depth: usize,
}

impl LogCall {
    pub fn cat(cat: impl Into<String>) -> Self {
        Self {
            cat: cat.into(),
            ..Self::default()
        }
    }

    pub fn special(mut self, special: ExtMap) -> Self {
        self.special = special;
        self
    }

    pub fn trace_depth(mut self, depth: usize) -> Self {
        self.trace_depth = depth;
        self
    }
}

/// The application-facing log handle.
pub struct Log {
    target: Box<dyn LogTarget>,
    name: String,
    enabled: bool,
    seq: u64,
    /// Exclusive: the highest sequence number is one less
    seq_limit: u64,
    trace_offset: usize,
    capture_stack: bool,
    extractor: CallPathExtractor,
    gate: CategoryGate,
    error_policy: ErrorPolicy,
    sticky: ExtMap,
}

impl Log {
    pub fn builder(target: impl LogTarget + 'static) -> LogBuilder {
        LogBuilder::new(target)
    }

    /// Logs a message with default options (uncategorized, no extras).
    ///
    /// `frames` is the caller-captured stack, most-recent-last (see
    /// [`frame!`](rotolog_core::frame)); pass `&[]` when capture is off.
    pub fn log(&mut self, msg: &str, frames: &[StackFrame]) -> Result<Option<u64>, EngineError> {
        self.log_with(msg, frames, LogCall::default())
    }

    /// Logs a message with explicit category, extension items and per-call
    /// trace depth.
    ///
    /// Returns the client-side sequence number, or `None` when the call was
    /// gated off, the log is switched off, or the error policy swallowed a
    /// delivery failure.
    pub fn log_with(
        &mut self,
        msg: &str,
        frames: &[StackFrame],
        call: LogCall,
    ) -> Result<Option<u64>, EngineError> {
        if !self.enabled || !self.gate.admits(&call.cat) {
            return Ok(None);
        }

        self.seq += 1;
        if self.seq == self.seq_limit {
            self.seq = 1;
        }

        let frames = if self.capture_stack { frames } else { &[] };
        let (path, caller_function) = self
            .extractor
            .extract(frames, call.trace_depth + self.trace_offset);

        let mut special = self.sticky.clone();
        special.extend(call.special);

        let thread = std::thread::current();
        let data = JobData {
            seq: self.seq,
            pid: std::process::id(),
            tid: None,
            thread_name: thread.name().unwrap_or("unnamed").to_owned(),
            timestamp_ms: Utc::now().timestamp_millis().max(0) as u64,
            msg: msg.to_owned(),
            cat: call.cat,
            path,
            stack_len: frames.len(),
            caller_function,
            special,
        };

        match self.target.log(data) {
            Ok(()) => Ok(Some(self.seq)),
            Err(e) => match self.error_policy {
                ErrorPolicy::Propagate => Err(e),
                ErrorPolicy::Silent => Ok(None),
                ErrorPolicy::Stdout => {
                    println!("logging error ({}): {e}", self.name);
                    Ok(None)
                }
                ErrorPolicy::Stderr => {
                    eprintln!("logging error ({}): {e}", self.name);
                    Ok(None)
                }
            },
        }
    }

    /// Items appended to every subsequent call, e.g. a request ip. Replaces
    /// previous sticky items; pass an empty map to stop sticking.
    pub fn set_sticky_items(&mut self, items: ExtMap) {
        self.sticky = items;
    }

    pub fn on(&mut self) {
        self.enabled = true;
    }

    pub fn off(&mut self) {
        self.enabled = false;
    }

    pub fn is_on(&self) -> bool {
        self.enabled
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stack budget can be adjusted anytime.
    pub fn set_stack_max(&mut self, stack_max: usize) {
        self.extractor.set_stack_max(stack_max);
    }

    /// Access to the wrapped target, e.g. to inspect a local server in tests.
    pub fn target_mut(&mut self) -> &mut dyn LogTarget {
        self.target.as_mut()
    }
}

/// Builder for [`Log`]. Registers the producer with the target on `build`.
pub struct LogBuilder {
    target: Box<dyn LogTarget>,
    name: String,
    seq_limit: u64,
    trace_offset: usize,
    stack_max: usize,
    capture_stack: bool,
    exclude: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
    gate: CategoryGate,
    error_policy: ErrorPolicy,
}

impl LogBuilder {
    pub fn new(target: impl LogTarget + 'static) -> Self {
        Self {
            target: Box::new(target),
            name: "Log".to_owned(),
            seq_limit: 1_000_000,
            trace_offset: 0,
            stack_max: 1,
            capture_stack: true,
            exclude: None,
            gate: CategoryGate::All,
            error_policy: ErrorPolicy::Propagate,
        }
    }

    /// Applies the `[stack]` section of the engine configuration.
    pub fn stack_config(mut self, config: &StackConfig) -> Self {
        self.capture_stack = config.capture;
        self.stack_max = config.stack_max;
        self.trace_offset = config.trace_offset;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Exclusive wrap limit: the sequence runs 1 .. limit-1, then restarts
    /// at 1.
    pub fn seq_limit(mut self, limit: u64) -> Self {
        self.seq_limit = limit;
        self
    }

    /// Permanently skipped innermost frames (wrapper functions etc.).
    pub fn trace_offset(mut self, offset: usize) -> Self {
        self.trace_offset = offset;
        self
    }

    /// Resolved call-path entries per job; 0 disables the trail.
    pub fn stack_max(mut self, stack_max: usize) -> Self {
        self.stack_max = stack_max;
        self
    }

    /// Disabling capture ignores any frames handed to `log`.
    pub fn capture_stack(mut self, capture: bool) -> Self {
        self.capture_stack = capture;
        self
    }

    /// Frames whose file name matches are elided from the call path.
    pub fn exclude_files(
        mut self,
        exclude: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.exclude = Some(Box::new(exclude));
        self
    }

    pub fn gate(mut self, gate: CategoryGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn build(mut self) -> Result<Log, EngineError> {
        if self.seq_limit < 2 {
            return Err(ConfigError::InvalidValue {
                field: "seq_limit".to_owned(),
                reason: "exclusive limit must be >= 2".to_owned(),
            }
            .into());
        }

        self.target.add_client()?;

        let mut extractor = CallPathExtractor::new(self.stack_max);
        if let Some(exclude) = self.exclude {
            extractor = extractor.with_exclude_boxed(exclude);
        }

        Ok(Log {
            target: self.target,
            name: self.name,
            enabled: true,
            seq: 0,
            seq_limit: self.seq_limit,
            trace_offset: self.trace_offset,
            capture_stack: self.capture_stack,
            extractor,
            gate: self.gate,
            error_policy: self.error_policy,
            sticky: ExtMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotolog_core::frame;

    /// Records every delivered record; optionally fails.
    #[derive(Default)]
    struct Probe {
        records: Vec<JobData>,
        fail: bool,
        clients: usize,
    }

    struct ProbeHandle(std::sync::Arc<std::sync::Mutex<Probe>>);

    impl LogTarget for ProbeHandle {
        fn log(&mut self, data: JobData) -> Result<(), EngineError> {
            let mut probe = self.0.lock().unwrap();
            if probe.fail {
                return Err(EngineError::transport("probe", "synthetic failure"));
            }
            probe.records.push(data);
            Ok(())
        }

        fn add_client(&mut self) -> Result<String, EngineError> {
            self.0.lock().unwrap().clients += 1;
            Ok("probe-client".to_owned())
        }
    }

    fn probe_log(build: impl FnOnce(LogBuilder) -> LogBuilder) -> (Log, std::sync::Arc<std::sync::Mutex<Probe>>) {
        let probe = std::sync::Arc::new(std::sync::Mutex::new(Probe::default()));
        let log = build(Log::builder(ProbeHandle(probe.clone())))
            .build()
            .unwrap();
        (log, probe)
    }

    #[test]
    fn build_registers_a_client() {
        let (_log, probe) = probe_log(|b| b);
        assert_eq!(probe.lock().unwrap().clients, 1);
    }

    #[test]
    fn sequence_wraps_at_exclusive_limit() {
        let (mut log, _probe) = probe_log(|b| b.seq_limit(3));
        let seqs: Vec<Option<u64>> = (0..5)
            .map(|_| log.log("m", &[]).unwrap())
            .collect();
        assert_eq!(
            seqs,
            [Some(1), Some(2), Some(1), Some(2), Some(1)]
        );
    }

    #[test]
    fn enable_gate_admits_only_listed_cats() {
        let (mut log, probe) = probe_log(|b| b.gate(CategoryGate::enable(["E"])));
        log.log_with("err", &[], LogCall::cat("E")).unwrap();
        log.log_with("warn", &[], LogCall::cat("W")).unwrap();
        log.log("plain", &[]).unwrap();
        let records = &probe.lock().unwrap().records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].msg, "err");
    }

    #[test]
    fn disable_gate_drops_listed_cats() {
        let (mut log, probe) = probe_log(|b| b.gate(CategoryGate::disable(["E"])));
        log.log_with("err", &[], LogCall::cat("E")).unwrap();
        log.log("plain", &[]).unwrap();
        let records = &probe.lock().unwrap().records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].msg, "plain");
    }

    #[test]
    fn gated_calls_do_not_consume_sequence_numbers() {
        let (mut log, _probe) = probe_log(|b| b.gate(CategoryGate::enable(["E"])));
        assert_eq!(log.log("skipped", &[]).unwrap(), None);
        assert_eq!(
            log.log_with("err", &[], LogCall::cat("E")).unwrap(),
            Some(1)
        );
    }

    #[test]
    fn off_switch_suppresses_calls() {
        let (mut log, probe) = probe_log(|b| b);
        log.off();
        assert_eq!(log.log("m", &[]).unwrap(), None);
        log.on();
        assert_eq!(log.log("m", &[]).unwrap(), Some(1));
        assert_eq!(probe.lock().unwrap().records.len(), 1);
    }

    #[test]
    fn sticky_items_are_merged_and_overridden() {
        let (mut log, probe) = probe_log(|b| b);
        let mut sticky = ExtMap::new();
        sticky.insert("ip".to_owned(), "10.0.0.1".into());
        sticky.insert("zone".to_owned(), "a".into());
        log.set_sticky_items(sticky);

        let mut special = ExtMap::new();
        special.insert("zone".to_owned(), "b".into());
        log.log_with("m", &[], LogCall::default().special(special))
            .unwrap();

        let records = &probe.lock().unwrap().records;
        assert_eq!(records[0].special.get("ip").unwrap().to_string(), "10.0.0.1");
        assert_eq!(records[0].special.get("zone").unwrap().to_string(), "b");
    }

    #[test]
    fn frames_feed_the_call_path() {
        let (mut log, probe) = probe_log(|b| b.stack_max(5));
        let frames = [frame!("outer"), frame!("inner")];
        log.log("m", &frames).unwrap();
        let records = &probe.lock().unwrap().records;
        assert_eq!(records[0].path.len(), 2);
        assert_eq!(records[0].stack_len, 2);
        assert_eq!(records[0].caller_function.as_deref(), Some("inner"));
    }

    #[test]
    fn capture_off_ignores_frames() {
        let (mut log, probe) = probe_log(|b| b.capture_stack(false));
        log.log("m", &[frame!()]).unwrap();
        let records = &probe.lock().unwrap().records;
        assert!(records[0].path.is_empty());
        assert_eq!(records[0].stack_len, 0);
    }

    #[test]
    fn propagate_policy_surfaces_target_errors() {
        let (mut log, probe) = probe_log(|b| b);
        probe.lock().unwrap().fail = true;
        assert!(log.log("m", &[]).is_err());
    }

    #[test]
    fn silent_policy_swallows_target_errors() {
        let (mut log, probe) = probe_log(|b| b.error_policy(ErrorPolicy::Silent));
        probe.lock().unwrap().fail = true;
        assert_eq!(log.log("m", &[]).unwrap(), None);
    }

    #[test]
    fn tiny_seq_limit_is_rejected() {
        let probe = std::sync::Arc::new(std::sync::Mutex::new(Probe::default()));
        let result = Log::builder(ProbeHandle(probe)).seq_limit(1).build();
        assert!(result.is_err());
    }
}
