//! Metric name constants.
//!
//! Central definitions for every counter the engine emits, so that names and
//! descriptions stay consistent across modules. Call sites use the
//! `metrics::counter!()` macro with these constants.
//!
//! Naming convention: prefix `rotolog_`, suffix `_total` for counters.

/// Jobs accepted into a server's pipeline (counter)
pub const JOBS_SUBMITTED_TOTAL: &str = "rotolog_jobs_submitted_total";

/// Filter or observer invocations that failed and were swallowed (counter)
pub const STAGE_ERRORS_TOTAL: &str = "rotolog_stage_errors_total";

/// Writer rotations performed (counter)
pub const ROTATIONS_TOTAL: &str = "rotolog_rotations_total";

/// Frames received over the socket transport (counter)
pub const FRAMES_RECEIVED_TOTAL: &str = "rotolog_frames_received_total";

/// Frames dropped due to a full ingest queue (counter)
pub const FRAMES_DROPPED_TOTAL: &str = "rotolog_frames_dropped_total";

/// Frames skipped because their payload failed to deserialize (counter)
pub const FRAMES_REJECTED_TOTAL: &str = "rotolog_frames_rejected_total";

/// Liveness pings consumed by the drain worker (counter)
pub const PINGS_TOTAL: &str = "rotolog_pings_total";

/// Label key for the stage kind ("filter" / "observer")
pub const LABEL_STAGE_KIND: &str = "kind";
