//! Pre-flight capability checks.
//!
//! Three checks run once per invocation, in order:
//! - `check_os`: the host OS is listed in the config's supported systems
//! - `check_tcpdump`: a short capture on the adapter works
//! - `check_root`: the run was started by root
//!
//! The resulting [`ConflictRecord`] is read-only afterward. The capture
//! coordinator consults it before spawning, and the report carries it in its
//! header.

mod host;

pub use host::{adapter_from_iw, HostError, HostFacts, HOST_PROBE_TIMEOUT};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::time::Duration;
use tracing::{info, instrument, warn};
use yfi_config::Settings;

use crate::collect::{CommandRunner, OutcomeStatus};
use crate::logging::event_names;

pub const CHECK_OS: &str = "check_os";
pub const CHECK_TCPDUMP: &str = "check_tcpdump";
pub const CHECK_ROOT: &str = "check_root";

/// Printed when no check recorded a conflict.
pub const ALL_SUPPORTED: &str = "All script features are supported";

/// Outcome of one check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub conflict: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Check name to outcome, in check order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    checks: Vec<(String, CheckOutcome)>,
}

impl ConflictRecord {
    /// A record with every check present and passing.
    pub fn new() -> Self {
        ConflictRecord {
            checks: [CHECK_OS, CHECK_TCPDUMP, CHECK_ROOT]
                .iter()
                .map(|name| (name.to_string(), CheckOutcome::default()))
                .collect(),
        }
    }

    /// Mark `check` as conflicting.
    pub fn record(&mut self, check: &str, message: impl Into<String>) {
        let outcome = CheckOutcome {
            conflict: true,
            message: message.into(),
        };
        match self.checks.iter_mut().find(|(name, _)| name == check) {
            Some((_, slot)) => *slot = outcome,
            None => self.checks.push((check.to_string(), outcome)),
        }
    }

    pub fn get(&self, check: &str) -> Option<&CheckOutcome> {
        self.checks
            .iter()
            .find(|(name, _)| name == check)
            .map(|(_, outcome)| outcome)
    }

    pub fn has_conflict(&self, check: &str) -> bool {
        self.get(check).is_some_and(|o| o.conflict)
    }

    /// The conflict message of `check`, if it conflicts.
    pub fn conflict_message(&self, check: &str) -> Option<&str> {
        self.get(check)
            .filter(|o| o.conflict)
            .map(|o| o.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckOutcome)> {
        self.checks.iter().map(|(name, o)| (name.as_str(), o))
    }

    /// Messages of every conflicting check, in check order.
    pub fn messages(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, o)| o.conflict)
            .map(|(_, o)| o.message.as_str())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.messages().is_empty()
    }

    /// Lines shown to the operator after the checks.
    pub fn summary_lines(&self) -> Vec<String> {
        let messages = self.messages();
        if messages.is_empty() {
            vec![ALL_SUPPORTED.to_string()]
        } else {
            messages.into_iter().map(str::to_string).collect()
        }
    }
}

impl Default for ConflictRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for ConflictRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.checks.len()))?;
        for (name, outcome) in &self.checks {
            map.serialize_entry(name, outcome)?;
        }
        map.end()
    }
}

/// Run every check against the host.
///
/// `capture` is the instantiated settings of the host's profile; without one
/// there is no capture command to try and the capture check conflicts.
#[instrument(skip_all, fields(os = %host.os_type, started_by = %host.started_by))]
pub fn check_capabilities(
    runner: &dyn CommandRunner,
    supported_systems: &[String],
    capture: Option<&Settings>,
    host: &HostFacts,
) -> ConflictRecord {
    let mut record = ConflictRecord::new();

    if !supported_systems.iter().any(|s| *s == host.os_type) {
        warn!(
            event = event_names::CHECK_CONFLICT,
            check = CHECK_OS,
            "trying to run on an unsupported system"
        );
        record.record(CHECK_OS, format!("{} is not supported yet", host.os_type));
    }

    match capture {
        Some(settings) => {
            let timeout = Duration::from_secs(settings.capture_check_timeout_secs);
            let outcome = runner.run(&settings.capture_check_command, timeout);
            let message = match outcome.status {
                OutcomeStatus::Ok => None,
                OutcomeStatus::NotOk | OutcomeStatus::Error => Some("Unable to start tcpdump"),
                OutcomeStatus::TimedOut { .. } => {
                    Some("Unable to get any data from interface with tcpdump")
                }
            };
            if let Some(message) = message {
                warn!(
                    event = event_names::CHECK_CONFLICT,
                    check = CHECK_TCPDUMP,
                    status = %outcome.status,
                    output = %outcome.raw_output,
                    "capture check failed"
                );
                record.record(CHECK_TCPDUMP, message);
            }
        }
        None => record.record(CHECK_TCPDUMP, "Unable to start tcpdump"),
    }

    if !host.is_root() {
        warn!(
            event = event_names::CHECK_CONFLICT,
            check = CHECK_ROOT,
            "not started by root"
        );
        record.record(
            CHECK_ROOT,
            "The script is not started by root - it will not collect some advanced diagnostics",
        );
    }

    info!(
        event = event_names::CHECK_FINISHED,
        conflicts = record.messages().len(),
        "capability checks finished"
    );
    record
}
