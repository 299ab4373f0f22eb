//! Job data model — one captured log event with its metadata.
//!
//! [`JobData`] is the flat record a producer ships (directly or over the
//! wire) to a server; [`Job`] is the materialized, history-resident form with
//! the server-rendered timestamp text attached. History slots recycle their
//! `Job` in place via [`Job::reinit`], so stages must not hold on to job
//! contents across their own invocation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::callpath::{CallPath, FileNameMode, format_file_name, format_path};

/// Extension-map value: string or integer only.
///
/// The restriction exists because backends persist these as typed columns or
/// wire fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtValue {
    Str(String),
    Int(i64),
}

impl From<&str> for ExtValue {
    fn from(v: &str) -> Self {
        ExtValue::Str(v.to_owned())
    }
}

impl From<String> for ExtValue {
    fn from(v: String) -> Self {
        ExtValue::Str(v)
    }
}

impl From<i64> for ExtValue {
    fn from(v: i64) -> Self {
        ExtValue::Int(v)
    }
}

impl fmt::Display for ExtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtValue::Str(s) => f.write_str(s),
            ExtValue::Int(i) => write!(f, "{i}"),
        }
    }
}

/// Free-form extension items attached to a job.
///
/// Keys must not shadow the fixed job attributes; callers are responsible
/// for disjoint naming.
pub type ExtMap = BTreeMap<String, ExtValue>;

/// Raw job record as produced by a client.
///
/// This is the wire payload of the socket transport (serialized as flat
/// JSON) and the argument of `LogServer::submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    /// Client-side sequence number, wraps at the configured exclusive limit
    pub seq: u64,
    /// Producer process id
    pub pid: u32,
    /// Producer thread id, if the platform exposes one
    pub tid: Option<u64>,
    /// Producer thread name
    pub thread_name: String,
    /// Wall-clock capture time, epoch milliseconds
    pub timestamp_ms: u64,
    /// Message text
    pub msg: String,
    /// Category tag; "" is the default/uncategorized value
    pub cat: String,
    /// Call path, innermost first; `None` marks an omitted frame
    pub path: CallPath,
    /// Length of the captured stack before truncation
    pub stack_len: usize,
    /// Innermost non-excluded function name
    pub caller_function: Option<String>,
    /// Custom extension items
    #[serde(default)]
    pub special: ExtMap,
}

/// A materialized log job, resident in a server's bounded history.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub seq: u64,
    pub pid: u32,
    pub tid: Option<u64>,
    pub thread_name: String,
    pub timestamp_ms: u64,
    /// Timestamp rendered with the server's configured format; "" in null mode
    pub ts_text: String,
    pub msg: String,
    pub cat: String,
    pub path: CallPath,
    pub stack_len: usize,
    pub caller_function: Option<String>,
    pub special: ExtMap,
}

impl Job {
    pub fn new(data: JobData, ts_text: String) -> Self {
        Self {
            seq: data.seq,
            pid: data.pid,
            tid: data.tid,
            thread_name: data.thread_name,
            timestamp_ms: data.timestamp_ms,
            ts_text,
            msg: data.msg,
            cat: data.cat,
            path: data.path,
            stack_len: data.stack_len,
            caller_function: data.caller_function,
            special: data.special,
        }
    }

    /// Overwrites this job in place with a new record.
    ///
    /// Used when a history slot is recycled; any reference kept by an earlier
    /// stage invocation is invalidated by this.
    pub fn reinit(&mut self, data: JobData, ts_text: String) {
        *self = Job::new(data, ts_text);
    }

    /// Index of the first resolved (non-omitted) path entry.
    fn first_site(&self) -> Option<usize> {
        self.path.iter().position(|entry| entry.is_some())
    }

    /// Caller's file name, rendered in the given mode.
    ///
    /// `None` when stack capture was disabled or every frame was omitted.
    pub fn caller_file(&self, mode: FileNameMode) -> Option<String> {
        let i = self.first_site()?;
        self.path[i]
            .as_ref()
            .map(|site| format_file_name(&site.file, mode))
    }

    /// Caller's line number, `None` when no resolved path entry exists.
    pub fn caller_line(&self) -> Option<u32> {
        let i = self.first_site()?;
        self.path[i].as_ref().map(|site| site.line)
    }

    /// Call path rendered as a single string; `imin` skips leading entries.
    pub fn path_str(&self, mode: FileNameMode, imin: usize) -> String {
        format_path(&self.path, mode, imin)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.msg.chars().take(18).collect();
        write!(f, "Job-{}-{}", self.cat, head)
    }
}
