//! Structured event vocabulary for logging.
//!
//! Every record emitted by the engine carries a `stage` field and, where it
//! marks a lifecycle step, an `event` name from [`event_names`].

use serde::{Deserialize, Serialize};

/// Processing stages of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup, configuration and host discovery.
    Init,
    /// Pre-flight capability checks.
    Check,
    /// Diagnostics and tests catalogs.
    Collect,
    /// Background packet capture.
    Capture,
    /// Narrative, digest and artifact rendering.
    Report,
    /// Archive packaging.
    Bundle,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Check => "check",
            Stage::Collect => "collect",
            Stage::Capture => "capture",
            Stage::Report => "report",
            Stage::Bundle => "bundle",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const HOST_DETECTED: &str = "host.detected";
    pub const SESSION_CREATED: &str = "session.created";

    // Check stage
    pub const CHECK_CONFLICT: &str = "check.conflict";
    pub const CHECK_FINISHED: &str = "check.finished";

    // Collect stage
    pub const POOL_STARTED: &str = "pool.started";
    pub const POOL_UNIT_FINISHED: &str = "pool.unit_finished";
    pub const POOL_UNIT_PANICKED: &str = "pool.unit_panicked";
    pub const POOL_FINISHED: &str = "pool.finished";
    pub const PROCESS_FINISHED: &str = "process.finished";
    pub const PROCESS_UNSUPPORTED: &str = "process.unsupported";

    // Capture stage
    pub const CAPTURE_STARTED: &str = "capture.started";
    pub const CAPTURE_SKIPPED: &str = "capture.skipped";
    pub const CAPTURE_WAITING: &str = "capture.waiting";
    pub const CAPTURE_TERMINATED: &str = "capture.terminated";
    pub const CAPTURE_FINISHED: &str = "capture.finished";
    pub const CAPTURE_FAILED: &str = "capture.failed";

    // Report/bundle stages
    pub const REPORT_WRITTEN: &str = "report.written";
    pub const BUNDLE_WRITTEN: &str = "bundle.written";
    pub const BUNDLE_FAILED: &str = "bundle.failed";
}

/// Correlation fields stamped onto every structured event of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    /// Report folder name, once the session exists.
    pub session_id: Option<String>,
    /// Host operating system.
    pub host: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            session_id: None,
            host: host.into(),
        }
    }

    /// Set the session ID.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
