//! Connectivity tests catalog unit.
//!
//! A test names a target and a list of sub-task tokens. Tokens run one after
//! another inside the test's unit, each through its own probe function, and
//! each leaves a `3_test_…` artifact headed by the executed command.

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use yfi_common::ArtifactStamp;
use yfi_config::{Settings, SubTask, TestTask, GATEWAY_PLACEHOLDER};

use super::pool::{CatalogResults, CatalogUnit};
use super::process_runner::{CommandRunner, ExecutionOutcome, OutcomeStatus};
use super::{persist_artifact, test_artifact_name};

/// Fallback ping target when no IPv4 default route was found.
pub const IPV4_GATEWAY_UNKNOWN: &str = "<IPv4 gateway not determined>";

/// Fallback ping target when no IPv6 default route was found.
pub const IPV6_GATEWAY_UNKNOWN: &str = "<IPv6 gateway not determined>";

/// Status text for a route lookup that succeeded; the route itself is in the artifact.
pub const ROUTE_SAVED: &str = "Saved to file";

/// Result of one sub-task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubTaskResult {
    pub executed_command: String,

    /// Display text: `OK`, `Not OK`, `Error`, a timeout notice, or [`ROUTE_SAVED`].
    pub status: String,

    #[serde(skip)]
    pub outcome: OutcomeStatus,
}

impl SubTaskResult {
    fn from_outcome(outcome: &ExecutionOutcome) -> Self {
        SubTaskResult {
            executed_command: outcome.executed_command.clone(),
            status: outcome.status.to_string(),
            outcome: outcome.status,
        }
    }
}

/// Per-token results of one test, in token order.
pub type TestResult = CatalogResults<SubTaskResult>;

/// Runs every sub-task of a test against its target.
pub struct TestsUnit<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a Settings,
    out_dir: &'a Path,
    timeout: Duration,
}

impl<'a> TestsUnit<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        settings: &'a Settings,
        out_dir: &'a Path,
        timeout: Duration,
    ) -> Self {
        TestsUnit {
            runner,
            settings,
            out_dir,
            timeout,
        }
    }

    /// Run one token against a target.
    pub fn probe(&self, token: &str, target: &str) -> SubTaskResult {
        self.dispatch(token, target).1
    }

    fn dispatch(&self, token: &str, target: &str) -> (ExecutionOutcome, SubTaskResult) {
        let Some(sub_task) = SubTask::parse(token) else {
            warn!(token, "unsupported sub-task");
            let outcome = ExecutionOutcome::error(format!("<unsupported sub-task: {}>", token));
            let result = SubTaskResult::from_outcome(&outcome);
            return (outcome, result);
        };

        let s = self.settings;
        let (outcome, result) = match sub_task {
            SubTask::Ping | SubTask::Ping6 => self.ping(sub_task, target),
            SubTask::Traceroute | SubTask::Traceroute6 => {
                let command = format!("{} {} {}", token, s.traceroute_arguments, target);
                let outcome = self.runner.run(&command, self.timeout);
                let result = SubTaskResult::from_outcome(&outcome);
                (outcome, result)
            }
            SubTask::Curl | SubTask::Curl6 => {
                let curl = if sub_task.is_ipv6() {
                    &s.curl_ipv6_command
                } else {
                    &s.curl_ipv4_command
                };
                let command = format!("{} http://{}", curl, target);
                let outcome = self.runner.run(&command, self.timeout);
                let result = SubTaskResult::from_outcome(&outcome);
                (outcome, result)
            }
            SubTask::Route | SubTask::Route6 => {
                let route = if sub_task.is_ipv6() {
                    &s.route_get_ipv6_command
                } else {
                    &s.route_get_ipv4_command
                };
                let command = format!("{} {}", route, target);
                let outcome = self.runner.run(&command, self.timeout);
                let mut result = SubTaskResult::from_outcome(&outcome);
                if outcome.status.is_ok() {
                    result.status = ROUTE_SAVED.to_string();
                }
                (outcome, result)
            }
        };
        debug!(token, status = %result.status, "sub-task finished");
        (outcome, result)
    }

    fn ping(&self, sub_task: SubTask, target: &str) -> (ExecutionOutcome, SubTaskResult) {
        let resolved;
        let target = if target == GATEWAY_PLACEHOLDER {
            resolved = self.gateway(sub_task.is_ipv6());
            resolved.as_str()
        } else {
            target
        };

        let command = format!(
            "{} {} {}",
            sub_task.as_str(),
            self.settings.ping_arguments,
            target
        );
        let mut outcome = self.runner.run(&command, self.timeout);
        // Timeouts and spawn failures lack the pattern too and count as failed pings.
        if !outcome.raw_output.contains(&self.settings.good_ping_pattern) {
            outcome.status = OutcomeStatus::NotOk;
        }
        let result = SubTaskResult::from_outcome(&outcome);
        (outcome, result)
    }

    /// Default gateway address, or the matching fallback text.
    pub fn gateway(&self, ipv6: bool) -> String {
        let s = self.settings;
        let (command, pattern, fallback) = if ipv6 {
            (
                &s.get_gateway_ipv6_command,
                &s.gateway_ipv6_regex,
                IPV6_GATEWAY_UNKNOWN,
            )
        } else {
            (
                &s.get_gateway_ipv4_command,
                &s.gateway_ipv4_regex,
                IPV4_GATEWAY_UNKNOWN,
            )
        };

        let outcome = self.runner.run(command, self.timeout);
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "invalid gateway pattern");
                return fallback.to_string();
            }
        };
        re.captures(&outcome.raw_output)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| fallback.to_string())
    }
}

impl CatalogUnit for TestsUnit<'_> {
    type Task = TestTask;
    type Output = TestResult;

    fn name<'t>(&self, task: &'t TestTask) -> &'t str {
        &task.name
    }

    #[instrument(skip_all, fields(test = %test.name, target = %test.target))]
    fn run(&self, test: &TestTask) -> TestResult {
        let entries = test
            .tokens()
            .map(|token| {
                let stamp = ArtifactStamp::now();
                let (outcome, result) = self.dispatch(token, &test.target);
                let artifact = format!(
                    "Executed command: {}\n\n{}",
                    result.executed_command, outcome.raw_output
                );
                persist_artifact(
                    self.out_dir,
                    &test_artifact_name(&test.filename, token, &stamp),
                    &artifact,
                );
                (token.to_string(), result)
            })
            .collect();
        CatalogResults::from_entries(entries)
    }

    fn failed(&self, test: &TestTask, reason: &str) -> TestResult {
        let entries = test
            .tokens()
            .map(|token| {
                let result = SubTaskResult {
                    executed_command: format!("<{} aborted: {}>", token, reason),
                    status: OutcomeStatus::Error.to_string(),
                    outcome: OutcomeStatus::Error,
                };
                (token.to_string(), result)
            })
            .collect();
        CatalogResults::from_entries(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::pool::TaskPool;
    use crate::mock_runner::ScriptedRunner;
    use crate::report::{Score, ScoreTally};
    use yfi_config::{get_preset, PresetName};

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn linux_settings() -> Settings {
        get_preset(PresetName::Linux).instantiate("wlan0").settings
    }

    fn test_task(name: &str, target: &str, tasks: &str) -> TestTask {
        TestTask {
            name: name.to_string(),
            target: target.to_string(),
            tasks: tasks.to_string(),
            filename: name.replace('.', ""),
        }
    }

    #[test]
    fn test_ping_resolves_gateway_placeholder() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new()
            .respond(
                settings.get_gateway_ipv4_command.as_str(),
                OutcomeStatus::Ok,
                "default via 192.168.1.1 dev wlan0 proto dhcp",
            )
            .respond("ping ", OutcomeStatus::Ok, "20 received, 0% packet loss");
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);

        let result = unit.probe("ping", GATEWAY_PLACEHOLDER);
        assert_eq!(
            result.executed_command,
            format!("ping {} 192.168.1.1", settings.ping_arguments)
        );
        assert_eq!(result.status, "OK");
    }

    #[test]
    fn test_ping6_gateway_fallback() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new().respond("ping6", OutcomeStatus::NotOk, "");
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);

        let result = unit.probe("ping6", GATEWAY_PLACEHOLDER);
        assert!(result.executed_command.ends_with(IPV6_GATEWAY_UNKNOWN));
        assert_eq!(result.status, "Not OK");
    }

    #[test]
    fn test_ping_without_good_pattern_is_not_ok() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new()
            .respond("ping ", OutcomeStatus::Ok, "20 received, 35% packet loss")
            .respond("ping6 ", OutcomeStatus::TimedOut { secs: 30 }, "");
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);

        assert_eq!(unit.probe("ping", "google.com").status, "Not OK");
        assert_eq!(unit.probe("ping6", "google.com").status, "Not OK");
    }

    #[test]
    fn test_failed_ping_lowers_the_score() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new()
            .respond("ping ", OutcomeStatus::TimedOut { secs: 30 }, "")
            .respond(settings.curl_ipv4_command.as_str(), OutcomeStatus::Ok, "HTTP/1.1 200 OK");
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);

        let ping = unit.probe("ping", "google.com");
        let curl = unit.probe("curl", "google.com");
        assert_eq!(ping.status, "Not OK");
        assert_eq!(unit.probe("ping6", "google.com").status, "Not OK");

        let narrative = format!(
            "Command: {}\n{}\nCommand: {}\n{}",
            ping.executed_command, ping.status, curl.executed_command, curl.status
        );
        let tally = ScoreTally::from_narrative(&narrative);
        assert_eq!((tally.ok, tally.not_ok), (1, 1));
        assert_eq!(tally.score, Score::Percent(50));
    }

    #[test]
    fn test_command_shapes() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new();
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);

        assert_eq!(
            unit.probe("traceroute6", "google.com").executed_command,
            format!("traceroute6 {} google.com", settings.traceroute_arguments)
        );
        assert_eq!(
            unit.probe("curl", "google.com").executed_command,
            format!("{} http://google.com", settings.curl_ipv4_command)
        );
        assert_eq!(
            unit.probe("route6", "google.com").executed_command,
            format!("{} google.com", settings.route_get_ipv6_command)
        );
    }

    #[test]
    fn test_route_ok_is_saved_to_file() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new().respond(
            settings.route_get_ipv4_command.as_str(),
            OutcomeStatus::Ok,
            "8.8.8.8 via 192.168.1.1 dev wlan0",
        );
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);

        assert_eq!(unit.probe("route", "8.8.8.8").status, ROUTE_SAVED);
        assert_eq!(unit.probe("route6", "8.8.8.8").status, "Error");
    }

    #[test]
    fn test_unknown_token() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new();
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);

        let result = unit.probe("dig", "google.com");
        assert_eq!(result.executed_command, "<unsupported sub-task: dig>");
        assert_eq!(result.status, "Error");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_unit_keeps_token_order_and_writes_artifacts() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new()
            .respond("ping ", OutcomeStatus::Ok, "20 received, 0% packet loss")
            .respond(settings.curl_ipv4_command.as_str(), OutcomeStatus::Ok, "HTTP/1.1 301");
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);
        let tests = [test_task("google.com", "google.com", "curl ping curl6")];

        let results = TaskPool::new(1).run_all(&tests[..], &unit).unwrap();
        let google = results.get("google.com").unwrap();
        assert_eq!(google.names().collect::<Vec<_>>(), ["curl", "ping", "curl6"]);
        assert_eq!(google.get("curl").unwrap().status, "OK");
        assert_eq!(google.get("curl6").unwrap().status, "Error");

        let mut files: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files.len(), 3);
        assert!(files[0].starts_with("3_test_googlecom_curl6_"));
        assert!(files[1].starts_with("3_test_googlecom_curl_"));

        let curl = std::fs::read_to_string(dir.path().join(&files[1])).unwrap();
        assert_eq!(
            curl,
            format!(
                "Executed command: {} http://google.com\n\nHTTP/1.1 301",
                settings.curl_ipv4_command
            )
        );
    }

    #[test]
    fn test_panicking_probe_is_isolated() {
        let settings = linux_settings();
        let runner = ScriptedRunner::new()
            .panic_on("traceroute")
            .respond("ping ", OutcomeStatus::Ok, "20 received, 0% packet loss");
        let dir = tempfile::tempdir().unwrap();
        let unit = TestsUnit::new(&runner, &settings, dir.path(), TIMEOUT);
        let tests = [
            test_task("broken", "1.1.1.1", "ping traceroute"),
            test_task("fine", "1.1.1.1", "ping"),
        ];

        let results = TaskPool::new(2).run_all(&tests[..], &unit).unwrap();
        assert_eq!(results.len(), 2);
        let broken = results.get("broken").unwrap();
        assert_eq!(broken.len(), 2);
        assert!(broken.iter().all(|(_, r)| r.outcome == OutcomeStatus::Error));
        assert_eq!(results.get("fine").unwrap().get("ping").unwrap().status, "OK");
    }
}
