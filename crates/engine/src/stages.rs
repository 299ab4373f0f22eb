//! Bundled pipeline stages.
//!
//! [`StackIndent`] indents message texts by the caller's stack depth, giving
//! plain text output a call-tree shape. Install it as a filter; the first
//! admitted job sets the zero-indent baseline.

use rotolog_core::job::ExtValue;
use rotolog_core::writer::Writer;

use crate::server::{JobHistory, Stage, StageError};

/// Extension key that re-adjusts the zero-indent baseline.
///
/// `log` a job with `{"stackindent_tara": 0}` to make that call
/// zero-indented; `-1` indents it by one token immediately.
pub const STACKINDENT_TARA_KEY: &str = "stackindent_tara";

/// Filter prefixing each message with one indent token per stack level
/// below the baseline.
///
/// The baseline adjusts itself to the first admitted job's depth; a
/// [`STACKINDENT_TARA_KEY`] extension item re-adjusts it later. Jobs
/// shallower than the baseline render with indent zero.
pub struct StackIndent {
    token: String,
    /// Only messages with this prefix are indented (or may re-adjust)
    msg_prefix: Option<String>,
    baseline: Option<i64>,
}

impl StackIndent {
    pub fn new() -> Self {
        Self::with_token("  ")
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            msg_prefix: None,
            baseline: None,
        }
    }

    pub fn msg_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.msg_prefix = Some(prefix.into());
        self
    }
}

impl Default for StackIndent {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for StackIndent {
    fn name(&self) -> &str {
        "stack-indent"
    }

    fn run(
        &mut self,
        history: &mut JobHistory,
        _writer: &mut dyn Writer,
    ) -> Result<(), StageError> {
        let Some(job) = history.latest_mut() else {
            return Ok(());
        };
        if let Some(prefix) = &self.msg_prefix {
            if !job.msg.starts_with(prefix.as_str()) {
                return Ok(());
            }
        }

        let depth = job.stack_len as i64;
        match job.special.get(STACKINDENT_TARA_KEY) {
            Some(ExtValue::Int(tara)) => self.baseline = Some(depth + tara),
            Some(_) => {}
            None => {
                if self.baseline.is_none() {
                    self.baseline = Some(depth);
                }
            }
        }

        let levels = (depth - self.baseline.unwrap_or(depth)).max(0) as usize;
        if levels > 0 {
            job.msg.insert_str(0, &self.token.repeat(levels));
        }
        Ok(())
    }
}
