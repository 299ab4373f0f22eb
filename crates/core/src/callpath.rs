//! Call-path capture and rendering.
//!
//! A producer hands the extractor a captured stack (most-recent-last) and a
//! logical depth offset; the extractor returns a bounded, optionally filtered
//! trail of [`CallSite`]s plus the immediate caller's function name. Frames
//! matched by the exclusion predicate appear as `None` markers so that a
//! censored trail still shows *that* something was elided.
//!
//! Capture is cooperative: Rust has no cheap portable stack walk, so callers
//! record frames themselves, typically with the [`frame!`](crate::frame)
//! macro at the seams they care about.

use serde::{Deserialize, Serialize};

/// One raw frame of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Source file of the frame
    pub file: String,
    /// Line number within the file
    pub line: u32,
    /// Enclosing function name ("" when unknown)
    pub function: String,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// Records the current call site as a [`StackFrame`].
///
/// `frame!()` captures file and line only; `frame!("name")` also records the
/// enclosing function name for the caller-function field of the job.
#[macro_export]
macro_rules! frame {
    () => {
        $crate::callpath::StackFrame::new(file!(), line!(), "")
    };
    ($function:expr) => {
        $crate::callpath::StackFrame::new(file!(), line!(), $function)
    };
}

/// A resolved call-path entry.
///
/// Appears inside `Option<CallSite>`; `None` marks a frame that was omitted
/// by the exclusion predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
}

/// Ordered call trail, innermost first. `None` entries are omitted frames.
pub type CallPath = Vec<Option<CallSite>>;

/// File-name rendering mode for call sites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileNameMode {
    /// Basename only, trailing extension stripped, dots become dashes
    #[default]
    Short,
    /// Full path, separators become underscores, dots become dashes
    Full,
}

/// Exclusion predicate over frame file names. `true` elides the frame.
pub type FileExclude = dyn Fn(&str) -> bool + Send + Sync;

/// Extracts a bounded call path from captured stacks.
pub struct CallPathExtractor {
    stack_max: usize,
    exclude: Option<Box<FileExclude>>,
}

impl CallPathExtractor {
    /// `stack_max` is the count of resolved entries to emit; 0 disables the
    /// trail entirely (the path comes back empty).
    pub fn new(stack_max: usize) -> Self {
        Self {
            stack_max,
            exclude: None,
        }
    }

    /// Installs the exclusion predicate. Excluded frames render as omission
    /// markers and do not count against `stack_max`.
    pub fn with_exclude(mut self, exclude: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.exclude = Some(Box::new(exclude));
        self
    }

    /// Like [`with_exclude`](Self::with_exclude) for an already boxed
    /// predicate.
    pub fn with_exclude_boxed(mut self, exclude: Box<FileExclude>) -> Self {
        self.exclude = Some(exclude);
        self
    }

    pub fn stack_max(&self) -> usize {
        self.stack_max
    }

    pub fn set_stack_max(&mut self, stack_max: usize) {
        self.stack_max = stack_max;
    }

    /// Walks outward from the frame `depth` below the top of the stack,
    /// emitting up to `stack_max` resolved sites.
    ///
    /// `frames` is most-recent-last. `depth` counts innermost frames to skip
    /// (log-internal machinery plus any caller-configured offset). A depth
    /// deeper than the stack degrades instead of failing: first one less
    /// skipped frame is tried, then the walk clamps to the outermost frame.
    /// A logging call must never abort the caller over an odd stack shape.
    ///
    /// Returns the path and the first non-excluded frame's function name.
    /// An empty stack (capture disabled) yields `(vec![], None)`.
    pub fn extract(&self, frames: &[StackFrame], depth: usize) -> (CallPath, Option<String>) {
        if frames.is_empty() {
            return (Vec::new(), None);
        }

        let last = frames.len() - 1;
        let start = if depth <= last {
            last - depth
        } else if depth - 1 <= last {
            last - (depth - 1)
        } else {
            0
        };

        let mut path = Vec::new();
        let mut caller_function = None;
        let mut budget = self.stack_max;
        let mut index = start as isize;

        while budget > 0 && index >= 0 {
            let frame = &frames[index as usize];
            let excluded = self
                .exclude
                .as_ref()
                .is_some_and(|pred| pred(&frame.file));

            if excluded {
                path.push(None);
            } else {
                budget -= 1;
                path.push(Some(CallSite {
                    file: frame.file.clone(),
                    line: frame.line,
                }));
                if caller_function.is_none() && !frame.function.is_empty() {
                    caller_function = Some(frame.function.clone());
                }
            }
            index -= 1;
        }

        (path, caller_function)
    }
}

/// Renders a file name according to the configured mode.
///
/// Short: `src/app/db.rs` -> `db`; Full: `src/app/db.rs` -> `src_app_db-rs`.
pub fn format_file_name(name: &str, mode: FileNameMode) -> String {
    let res = match mode {
        FileNameMode::Short => {
            let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
            match base.rsplit_once('.') {
                Some((stem, _ext)) if !stem.is_empty() => stem.to_owned(),
                _ => base.to_owned(),
            }
        }
        FileNameMode::Full => name.replace(['/', '\\'], "_"),
    };
    res.replace('.', "-")
}

/// Renders a call path as a single human-readable token.
///
/// The entry at `imin` opens with `|`, later entries are prefixed `<-`, and
/// runs of omitted frames collapse to one `<-...`. Empty path renders as "".
pub fn format_path(path: &[Option<CallSite>], mode: FileNameMode, imin: usize) -> String {
    let mut res = String::new();
    let mut last_was_omitted = false;

    for (i, entry) in path.iter().enumerate() {
        if i < imin {
            continue;
        }
        let separator = if i == imin {
            res.push('|');
            ""
        } else {
            "<-"
        };

        match entry {
            Some(site) => {
                res.push_str(separator);
                res.push_str(&format_file_name(&site.file, mode));
                res.push('(');
                res.push_str(&site.line.to_string());
                res.push(')');
                last_was_omitted = false;
            }
            None => {
                if !last_was_omitted {
                    res.push_str("<-...");
                    last_was_omitted = true;
                }
            }
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(names: &[(&str, u32)]) -> Vec<StackFrame> {
        names
            .iter()
            .map(|(f, l)| StackFrame::new(*f, *l, format!("fn_{l}")))
            .collect()
    }

    #[test]
    fn extracts_innermost_frames_outward() {
        // most-recent-last: main -> middle -> leaf
        let frames = stack(&[("main.rs", 10), ("middle.rs", 20), ("leaf.rs", 30)]);
        let extractor = CallPathExtractor::new(2);
        let (path, func) = extractor.extract(&frames, 0);
        assert_eq!(
            path,
            vec![
                Some(CallSite {
                    file: "leaf.rs".to_owned(),
                    line: 30
                }),
                Some(CallSite {
                    file: "middle.rs".to_owned(),
                    line: 20
                }),
            ]
        );
        assert_eq!(func.as_deref(), Some("fn_30"));
    }

    #[test]
    fn depth_skips_inner_frames() {
        let frames = stack(&[("main.rs", 10), ("middle.rs", 20), ("leaf.rs", 30)]);
        let (path, func) = CallPathExtractor::new(5).extract(&frames, 1);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].as_ref().unwrap().file, "middle.rs");
        assert_eq!(func.as_deref(), Some("fn_20"));
    }

    #[test]
    fn excessive_depth_clamps_to_outermost() {
        let frames = stack(&[("main.rs", 10), ("leaf.rs", 30)]);
        let (path, _) = CallPathExtractor::new(5).extract(&frames, 99);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].as_ref().unwrap().file, "main.rs");
    }

    #[test]
    fn depth_one_too_deep_retries_with_one_less() {
        let frames = stack(&[("main.rs", 10), ("leaf.rs", 30)]);
        // depth 2 overruns a 2-frame stack; depth 1 is the retry
        let (path, _) = CallPathExtractor::new(5).extract(&frames, 2);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].as_ref().unwrap().file, "main.rs");
    }

    #[test]
    fn empty_stack_yields_empty_path() {
        let (path, func) = CallPathExtractor::new(5).extract(&[], 0);
        assert!(path.is_empty());
        assert!(func.is_none());
    }

    #[test]
    fn excluded_frames_become_markers_and_do_not_consume_budget() {
        let frames = stack(&[
            ("app.rs", 1),
            ("vendor/glue.rs", 2),
            ("vendor/glue.rs", 3),
            ("caller.rs", 4),
        ]);
        let extractor =
            CallPathExtractor::new(2).with_exclude(|file| file.starts_with("vendor/"));
        let (path, func) = extractor.extract(&frames, 0);
        // caller, two markers, then app.rs still fits the budget of 2
        assert_eq!(path.len(), 4);
        assert_eq!(path[0].as_ref().unwrap().file, "caller.rs");
        assert!(path[1].is_none());
        assert!(path[2].is_none());
        assert_eq!(path[3].as_ref().unwrap().file, "app.rs");
        assert_eq!(func.as_deref(), Some("fn_4"));
    }

    #[test]
    fn caller_function_comes_from_first_non_excluded_frame() {
        let frames = stack(&[("app.rs", 1), ("wrapper.rs", 2)]);
        let extractor = CallPathExtractor::new(5).with_exclude(|f| f == "wrapper.rs");
        let (_, func) = extractor.extract(&frames, 0);
        assert_eq!(func.as_deref(), Some("fn_1"));
    }

    #[test]
    fn stack_max_zero_disables_trail() {
        let frames = stack(&[("main.rs", 10)]);
        let (path, func) = CallPathExtractor::new(0).extract(&frames, 0);
        assert!(path.is_empty());
        assert!(func.is_none());
    }

    #[test]
    fn short_file_name_strips_path_and_extension() {
        assert_eq!(format_file_name("src/app/db.rs", FileNameMode::Short), "db");
        assert_eq!(format_file_name("plain", FileNameMode::Short), "plain");
        assert_eq!(
            format_file_name("dir/a.b.rs", FileNameMode::Short),
            "a-b"
        );
    }

    #[test]
    fn full_file_name_keeps_path() {
        assert_eq!(
            format_file_name("src/app/db.rs", FileNameMode::Full),
            "src_app_db-rs"
        );
    }

    #[test]
    fn path_rendering_collapses_omission_runs() {
        let path = vec![
            Some(CallSite {
                file: "a.rs".to_owned(),
                line: 1,
            }),
            None,
            None,
            Some(CallSite {
                file: "b.rs".to_owned(),
                line: 2,
            }),
        ];
        assert_eq!(
            format_path(&path, FileNameMode::Short, 0),
            "|a(1)<-...<-b(2)"
        );
    }

    #[test]
    fn path_rendering_respects_imin() {
        let path = vec![
            Some(CallSite {
                file: "a.rs".to_owned(),
                line: 1,
            }),
            Some(CallSite {
                file: "b.rs".to_owned(),
                line: 2,
            }),
        ];
        assert_eq!(format_path(&path, FileNameMode::Short, 1), "|b(2)");
        assert_eq!(format_path(&path, FileNameMode::Short, 0), "|a(1)<-b(2)");
        assert_eq!(format_path(&path, FileNameMode::Short, 5), "");
    }

    #[test]
    fn frame_macro_records_call_site() {
        let f = frame!("frame_macro_records_call_site");
        assert!(f.file.ends_with("callpath.rs"));
        assert_eq!(f.function, "frame_macro_records_call_site");
    }
}
