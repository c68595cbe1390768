//! Collector configuration schema.
//!
//! A [`Config`] carries one [`Profile`] per supported operating system. The
//! caller selects a profile by the host's lowercased `uname` and calls
//! [`Profile::instantiate`] with the wireless adapter name before use.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder substituted with the adapter name by [`Profile::instantiate`].
pub const ADAPTER_PLACEHOLDER: &str = "{adapter}";

/// Test target that is resolved to the default gateway at probe time.
pub const GATEWAY_PLACEHOLDER: &str = "gw_placeholder";

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Must equal [`crate::CONFIG_SCHEMA_VERSION`].
    pub schema_version: String,

    /// Operating systems (lowercased `uname`) this config may run on.
    pub supported_systems: Vec<String>,

    pub darwin: Profile,
    pub linux: Profile,
}

impl Config {
    /// Profile for a lowercased OS name, if the schema carries one.
    pub fn profile_for(&self, os_type: &str) -> Option<&Profile> {
        match os_type {
            "darwin" => Some(&self.darwin),
            "linux" => Some(&self.linux),
            _ => None,
        }
    }

    pub fn is_supported(&self, os_type: &str) -> bool {
        self.supported_systems.iter().any(|s| s == os_type)
    }
}

/// Everything needed to collect on one operating system.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Profile {
    pub settings: Settings,

    /// Diagnostics catalog, executed in declaration order.
    pub diagnostics: Vec<DiagnosticTask>,

    /// Connectivity tests catalog, executed in declaration order.
    pub tests: Vec<TestTask>,

    /// Highlight rules; their order is the digest order.
    pub highlights: Vec<HighlightRule>,
}

impl Profile {
    /// Substitute `{adapter}` in every command and pattern.
    pub fn instantiate(&self, adapter: &str) -> Profile {
        let sub = |s: &str| s.replace(ADAPTER_PLACEHOLDER, adapter);

        let s = &self.settings;
        let settings = Settings {
            ping_arguments: sub(&s.ping_arguments),
            good_ping_pattern: s.good_ping_pattern.clone(),
            traceroute_arguments: sub(&s.traceroute_arguments),
            route_get_ipv4_command: sub(&s.route_get_ipv4_command),
            route_get_ipv6_command: sub(&s.route_get_ipv6_command),
            curl_ipv4_command: sub(&s.curl_ipv4_command),
            curl_ipv6_command: sub(&s.curl_ipv6_command),
            get_gateway_ipv4_command: sub(&s.get_gateway_ipv4_command),
            get_gateway_ipv6_command: sub(&s.get_gateway_ipv6_command),
            gateway_ipv4_regex: sub(&s.gateway_ipv4_regex),
            gateway_ipv6_regex: sub(&s.gateway_ipv6_regex),
            capture_command: sub(&s.capture_command),
            capture_check_command: sub(&s.capture_check_command),
            capture_output_filter: s.capture_output_filter.clone(),
            ..s.clone()
        };

        Profile {
            settings,
            diagnostics: self
                .diagnostics
                .iter()
                .map(|d| DiagnosticTask {
                    name: d.name.clone(),
                    command: sub(&d.command),
                    filename: d.filename.clone(),
                    expressions: d.expressions.iter().map(|e| sub(e)).collect(),
                })
                .collect(),
            tests: self.tests.clone(),
            highlights: self
                .highlights
                .iter()
                .map(|h| HighlightRule {
                    pattern: sub(&h.pattern),
                    ..h.clone()
                })
                .collect(),
        }
    }
}

/// Commands, patterns, and limits shared by every unit of a profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    pub ping_arguments: String,

    /// Substring a successful ping's output must contain.
    pub good_ping_pattern: String,

    pub traceroute_arguments: String,
    pub route_get_ipv4_command: String,
    pub route_get_ipv6_command: String,
    pub curl_ipv4_command: String,
    pub curl_ipv6_command: String,
    pub get_gateway_ipv4_command: String,
    pub get_gateway_ipv6_command: String,

    /// Group 1 is the gateway address.
    pub gateway_ipv4_regex: String,
    pub gateway_ipv6_regex: String,

    /// Background capture command; the pcap path is appended.
    pub capture_command: String,

    /// Short capture used to probe whether the capture tool works at all.
    pub capture_check_command: String,

    /// Filter applied when reading the pcap back.
    pub capture_output_filter: String,

    #[serde(default = "default_capture_window_secs")]
    pub capture_window_secs: u64,

    #[serde(default = "default_capture_check_timeout_secs")]
    pub capture_check_timeout_secs: u64,

    #[serde(default = "default_capture_settle_ms")]
    pub capture_settle_ms: u64,

    #[serde(default = "default_subprocess_timeout_secs")]
    pub subprocess_timeout_secs: u64,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_capture_window_secs() -> u64 {
    90
}

fn default_capture_check_timeout_secs() -> u64 {
    5
}

fn default_capture_settle_ms() -> u64 {
    1000
}

fn default_subprocess_timeout_secs() -> u64 {
    30
}

fn default_max_parallel() -> usize {
    5
}

/// One diagnostic command and the patterns that pull facts out of its output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DiagnosticTask {
    pub name: String,
    pub command: String,

    /// Artifact name fragment: `2_diag_<filename>_<stamp>.txt`.
    pub filename: String,

    #[serde(default)]
    pub expressions: Vec<String>,
}

/// A target and the space-separated probes to run against it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestTask {
    pub name: String,

    /// Host, address, or [`GATEWAY_PLACEHOLDER`].
    pub target: String,

    /// e.g. `"ping ping6 curl curl6"`.
    pub tasks: String,

    /// Artifact name fragment: `3_test_<filename>_<token>_<stamp>.txt`.
    pub filename: String,
}

impl TestTask {
    /// Sub-task tokens in declaration order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tasks.split_whitespace()
    }
}

/// Known probe identifiers for [`TestTask::tasks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubTask {
    Ping,
    Ping6,
    Traceroute,
    Traceroute6,
    Curl,
    Curl6,
    Route,
    Route6,
}

impl SubTask {
    pub const ALL: &'static [SubTask] = &[
        SubTask::Ping,
        SubTask::Ping6,
        SubTask::Traceroute,
        SubTask::Traceroute6,
        SubTask::Curl,
        SubTask::Curl6,
        SubTask::Route,
        SubTask::Route6,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubTask::Ping => "ping",
            SubTask::Ping6 => "ping6",
            SubTask::Traceroute => "traceroute",
            SubTask::Traceroute6 => "traceroute6",
            SubTask::Curl => "curl",
            SubTask::Curl6 => "curl6",
            SubTask::Route => "route",
            SubTask::Route6 => "route6",
        }
    }

    pub fn parse(token: &str) -> Option<SubTask> {
        SubTask::ALL.iter().copied().find(|t| t.as_str() == token)
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(
            self,
            SubTask::Ping6 | SubTask::Traceroute6 | SubTask::Curl6 | SubTask::Route6
        )
    }
}

impl fmt::Display for SubTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line (or block) of the digest.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HighlightRule {
    pub id: String,
    pub pattern: String,
    pub description: String,
    pub strategy: FormattingStrategy,
}

/// How a highlight rule turns its matches into digest text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormattingStrategy {
    /// Never emits; the rule exists for its pattern only.
    Suppressed,

    /// Emits the description and every match on its own line, if any matched.
    Failures,

    /// `<description> <matches>`; when nothing matched, `missing_message` (if set).
    AddressList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing_message: Option<String>,
    },

    /// Splits the first match into fixed-width groups, e.g. a bare BSSID into `aa:bb:…`.
    Regroup {
        #[serde(default = "default_regroup_width")]
        width: usize,
        #[serde(default = "default_regroup_max_groups")]
        max_groups: usize,
        #[serde(default = "default_regroup_separator")]
        separator: String,
        failure_message: String,
    },

    /// Counts matches unless the narrative carries `failure_sentinel`.
    Count {
        failure_sentinel: String,
        failure_message: String,
        none_message: String,
    },

    /// `<description> <matches>`, optionally preceded by a blank line.
    FreeText {
        #[serde(default)]
        leading_blank: bool,
    },
}

fn default_regroup_width() -> usize {
    2
}

fn default_regroup_max_groups() -> usize {
    6
}

fn default_regroup_separator() -> String {
    ":".to_string()
}

impl FormattingStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            FormattingStrategy::Suppressed => "suppressed",
            FormattingStrategy::Failures => "failures",
            FormattingStrategy::AddressList { .. } => "address_list",
            FormattingStrategy::Regroup { .. } => "regroup",
            FormattingStrategy::Count { .. } => "count",
            FormattingStrategy::FreeText { .. } => "free_text",
        }
    }
}
