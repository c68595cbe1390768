//! Host discovery: who runs the collector, on what OS, over which adapter.

use regex::Regex;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::collect::CommandRunner;
use crate::logging::event_names;

/// Timeout for each discovery command.
pub const HOST_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const DARWIN_ADAPTER: &str = "en0";
const UNKNOWN_ADAPTER: &str = "unknown";

#[derive(Debug, Error)]
pub enum HostError {
    #[error("`{command}` failed: {status}")]
    Command { command: String, status: String },

    #[error("no wireless interface found in `iw dev` output")]
    NoAdapter,
}

/// Facts about the host, gathered once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostFacts {
    /// Effective user (`whoami`); `root` under sudo.
    pub started_by: String,

    /// Login user owning the report folder.
    pub username: String,

    /// Lowercased `uname`.
    pub os_type: String,

    pub adapter: String,
}

impl HostFacts {
    /// Discover the host through `runner`.
    ///
    /// `interface` overrides adapter discovery.
    pub fn detect(runner: &dyn CommandRunner, interface: Option<&str>) -> Result<Self, HostError> {
        Self::detect_with_env(runner, interface, |key| std::env::var(key).ok())
    }

    /// [`HostFacts::detect`] with an injectable environment lookup.
    pub fn detect_with_env(
        runner: &dyn CommandRunner,
        interface: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, HostError> {
        let started_by = required(runner, "whoami")?;
        let username = optional(runner, "logname")
            .or_else(|| env("SUDO_USER").filter(|s| !s.is_empty()))
            .or_else(|| env("USER").filter(|s| !s.is_empty()))
            .unwrap_or_else(|| started_by.clone());
        let os_type = required(runner, "uname")?.to_lowercase();

        let adapter = match interface {
            Some(name) => name.to_string(),
            None => match os_type.as_str() {
                "darwin" => DARWIN_ADAPTER.to_string(),
                "linux" => {
                    let iw = runner.run("iw dev", HOST_PROBE_TIMEOUT);
                    adapter_from_iw(&iw.raw_output).ok_or(HostError::NoAdapter)?
                }
                _ => UNKNOWN_ADAPTER.to_string(),
            },
        };

        let facts = HostFacts {
            started_by,
            username,
            os_type,
            adapter,
        };
        info!(
            event = event_names::HOST_DETECTED,
            started_by = %facts.started_by,
            username = %facts.username,
            os = %facts.os_type,
            adapter = %facts.adapter,
            "host detected"
        );
        Ok(facts)
    }

    pub fn is_root(&self) -> bool {
        self.started_by == "root"
    }
}

/// First interface listed by `iw dev`.
pub fn adapter_from_iw(output: &str) -> Option<String> {
    let re = Regex::new(r"Interface (\S*)").ok()?;
    re.captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

fn required(runner: &dyn CommandRunner, command: &str) -> Result<String, HostError> {
    let outcome = runner.run(command, HOST_PROBE_TIMEOUT);
    let value = outcome.stdout().trim();
    if !outcome.status.is_ok() || value.is_empty() {
        return Err(HostError::Command {
            command: command.to_string(),
            status: outcome.status.to_string(),
        });
    }
    Ok(value.to_string())
}

fn optional(runner: &dyn CommandRunner, command: &str) -> Option<String> {
    match required(runner, command) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, "falling back");
            None
        }
    }
}
