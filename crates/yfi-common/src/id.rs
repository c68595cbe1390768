//! Run identity and artifact naming.
//!
//! Every collection run is identified three ways:
//! - a [`RunStamp`] (`%y%m%d_%H%M%S`) taken once at start and embedded in report file names
//! - a [`DiagName`] (`<user>_wifi_diag_<stamp>`) naming the report folder and archive
//! - a [`RunId`] (`run-<12 hex>`) correlating log records
//!
//! Per-unit artifacts use an [`ArtifactStamp`], which adds microseconds so that
//! concurrent units never collide on a file name.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

const RUN_STAMP_FORMAT: &str = "%y%m%d_%H%M%S";
const ARTIFACT_STAMP_FORMAT: &str = "%y%m%d_%H%M%S_%6f";

/// Second-resolution run timestamp, e.g. `260115_143022`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunStamp(pub String);

impl RunStamp {
    /// Stamp for the given local time.
    pub fn from_datetime(at: &DateTime<Local>) -> Self {
        RunStamp(at.format(RUN_STAMP_FORMAT).to_string())
    }

    /// Stamp for the current local time.
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Parse and validate an existing stamp.
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, RUN_STAMP_FORMAT).ok()?;
        Some(RunStamp(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microsecond-resolution stamp for per-unit artifacts, e.g. `260115_143022_004711`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactStamp(pub String);

impl ArtifactStamp {
    pub fn from_datetime(at: &DateTime<Local>) -> Self {
        ArtifactStamp(at.format(ARTIFACT_STAMP_FORMAT).to_string())
    }

    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }
}

impl fmt::Display for ArtifactStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a run's report folder and archive.
///
/// Runs started without root privileges cannot collect every diagnostic,
/// so they are marked `basic`:
/// - `alice_wifi_diag_260115_143022` (started by root)
/// - `alice_basic_wifi_diag_260115_143022` (unprivileged)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagName(pub String);

impl DiagName {
    pub fn new(username: &str, privileged: bool, stamp: &RunStamp) -> Self {
        let kind = if privileged {
            "wifi_diag"
        } else {
            "basic_wifi_diag"
        };
        DiagName(format!("{}_{}_{}", sanitize_user(username), kind, stamp))
    }

    /// Whether the name marks a full (root) collection.
    pub fn is_privileged(&self) -> bool {
        !self.0.contains("_basic_wifi_diag_")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keep user names usable as a path component.
fn sanitize_user(username: &str) -> String {
    let cleaned: String = username
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Log correlation id for one invocation.
///
/// Format: `run-<12 hex chars>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        RunId(format!("run-{}", &uuid[..12]))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
