//! Built-in collection presets.
//!
//! Provides one profile per supported operating system:
//! - Darwin: ifconfig, system_profiler, airport, wdutil, networkQuality
//! - Linux: journalctl, ip, iw, iwconfig, nmcli, hostnamectl
//!
//! Both presets share the connectivity test catalog.

use crate::schema::{
    Config, DiagnosticTask, FormattingStrategy, HighlightRule, Profile, Settings, TestTask,
    GATEWAY_PLACEHOLDER,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Available built-in presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    /// macOS laptops
    Darwin,
    /// Linux laptops with iw/NetworkManager
    Linux,
}

impl PresetName {
    /// All available preset names.
    pub const ALL: &'static [PresetName] = &[PresetName::Darwin, PresetName::Linux];

    /// Get preset name as a string (matches lowercased `uname`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::Darwin => "darwin",
            PresetName::Linux => "linux",
        }
    }

    /// Parse preset name from string.
    pub fn parse(s: &str) -> Option<PresetName> {
        match s.to_lowercase().as_str() {
            "darwin" | "macos" | "osx" | "mac" => Some(PresetName::Darwin),
            "linux" => Some(PresetName::Linux),
            _ => None,
        }
    }

    /// Get a description of the preset.
    pub fn description(&self) -> &'static str {
        match self {
            PresetName::Darwin => {
                "macOS: system_profiler, airport, wdutil, unified log and networkQuality throughput"
            }
            PresetName::Linux => "Linux: journalctl, ip, iw, iwconfig, nmcli and hostnamectl",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PresetName {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetName::parse(s).ok_or_else(|| PresetError::UnknownPreset(s.to_string()))
    }
}

/// Errors related to preset operations.
#[derive(Debug, Clone)]
pub enum PresetError {
    /// Unknown preset name.
    UnknownPreset(String),
}

impl fmt::Display for PresetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetError::UnknownPreset(name) => {
                write!(
                    f,
                    "Unknown preset '{}'. Available: {}",
                    name,
                    PresetName::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
    }
}

impl std::error::Error for PresetError {}

/// Get the profile for a preset. `{adapter}` placeholders are left in place.
pub fn get_preset(name: PresetName) -> Profile {
    match name {
        PresetName::Darwin => darwin_preset(),
        PresetName::Linux => linux_preset(),
    }
}

/// The configuration used when no config file is found.
pub fn builtin_config() -> Config {
    Config {
        schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
        supported_systems: PresetName::ALL
            .iter()
            .map(|p| p.as_str().to_string())
            .collect(),
        darwin: darwin_preset(),
        linux: linux_preset(),
    }
}

fn diag(name: &str, command: &str, filename: &str, expressions: &[&str]) -> DiagnosticTask {
    DiagnosticTask {
        name: name.to_string(),
        command: command.to_string(),
        filename: filename.to_string(),
        expressions: expressions.iter().map(|e| e.to_string()).collect(),
    }
}

fn rule(id: &str, pattern: &str, description: &str, strategy: FormattingStrategy) -> HighlightRule {
    HighlightRule {
        id: id.to_string(),
        pattern: pattern.to_string(),
        description: description.to_string(),
        strategy,
    }
}

fn plain() -> FormattingStrategy {
    FormattingStrategy::FreeText {
        leading_blank: false,
    }
}

fn spaced() -> FormattingStrategy {
    FormattingStrategy::FreeText {
        leading_blank: true,
    }
}

fn addresses(missing_message: Option<&str>) -> FormattingStrategy {
    FormattingStrategy::AddressList {
        missing_message: missing_message.map(str::to_string),
    }
}

fn ra_count() -> FormattingStrategy {
    FormattingStrategy::Count {
        failure_sentinel: "Tcpdump error".to_string(),
        failure_message: "! Tcpdump error - check logs".to_string(),
        none_message: "! No RA messages captured".to_string(),
    }
}

/// Rules shared by both presets, appended last so failures close the digest.
fn outcome_rules() -> Vec<HighlightRule> {
    vec![
        rule("ok", r"Command: (.*)\nOK", "OK:", FormattingStrategy::Suppressed),
        rule(
            "not_ok",
            r"Command: (.*)\nNot OK",
            "Not OK:",
            FormattingStrategy::Failures,
        ),
        rule(
            "error",
            r"Command: (.*)\nError",
            "Error:",
            FormattingStrategy::Failures,
        ),
    ]
}

fn universal_tests() -> Vec<TestTask> {
    let test = |name: &str, target: &str, tasks: &str, filename: &str| TestTask {
        name: name.to_string(),
        target: target.to_string(),
        tasks: tasks.to_string(),
        filename: filename.to_string(),
    };

    vec![
        test("google_dns", "8.8.8.8", "ping route", "8888"),
        test("google_com", "google.com", "ping ping6 curl curl6", "googlecom"),
        test("facebook", "facebook.com", "ping ping6 curl curl6", "facebook"),
        test("youtube", "youtube.com", "ping ping6 curl curl6", "youtube"),
        test("the_wlpc", "thewlpc.com", "ping ping6 curl traceroute", "wlpc"),
        test("gateway", GATEWAY_PLACEHOLDER, "ping ping6", "gateway"),
    ]
}

fn capture_settings() -> (String, String, String) {
    (
        "tcpdump -i {adapter} -W 1 -G 90 -w".to_string(),
        "tcpdump -i {adapter} -c 1".to_string(),
        "icmp6 && ip6[40] == 134".to_string(),
    )
}

fn darwin_preset() -> Profile {
    let (capture_command, capture_check_command, capture_output_filter) = capture_settings();

    let settings = Settings {
        ping_arguments: "-c 20".to_string(),
        good_ping_pattern: " 0.0% packet loss".to_string(),
        traceroute_arguments: "-I".to_string(),
        route_get_ipv4_command: "route -vn get".to_string(),
        route_get_ipv6_command: "route -vn get -inet6".to_string(),
        curl_ipv4_command: "curl -4Is".to_string(),
        curl_ipv6_command: "curl -6Is".to_string(),
        get_gateway_ipv4_command: "netstat -rn".to_string(),
        get_gateway_ipv6_command: "netstat -rn".to_string(),
        gateway_ipv4_regex: r"default +(\d+.\d+.\d+.\d+) +\S+ +{adapter}".to_string(),
        gateway_ipv6_regex: r"default +(\S+:\S+) + +\S+ +{adapter}".to_string(),
        capture_command,
        capture_check_command,
        capture_output_filter,
        capture_window_secs: 90,
        capture_check_timeout_secs: 5,
        capture_settle_ms: 1000,
        subprocess_timeout_secs: 30,
        max_parallel: 5,
    };

    let diagnostics = vec![
        diag("log_show", "log show --info --debug --last 5m", "log_show", &[]),
        diag(
            "ifconfig",
            "ifconfig {adapter}",
            "ifconfig",
            &[r"ether \S+", r"inet6 .+", r"inet .+"],
        ),
        diag("public_ip", "curl -s ifconfig.me", "public_ip", &[r"\S+"]),
        diag(
            "gateway_ipv4",
            "route get default",
            "gateway4",
            &[r"gateway: \S+"],
        ),
        diag(
            "gateway_ipv6",
            "route -n get -inet6 default",
            "gateway6",
            &[r"gateway: \S+"],
        ),
        diag("netstat", "netstat -rn", "netstat", &[r"default.+en\d+"]),
        diag(
            "system_profiler",
            "system_profiler SPAirPortDataType SPHardwareDataType SPSoftwareDataType SPLogsDataType",
            "system_profiler",
            &[
                r"Computer Name: .+",
                r"User Name: .+",
                r"System Version: .+",
                r"Time since boot: .+",
                r"Card Type: .+",
                r"Firmware Version: .+",
                r"Supported Channels: .+",
                r"Supported PHY Modes: .+",
                r"Current Network Information:[\s\S]*MCS Index: \d+",
                r#""IO80211BSSID.+"#,
            ],
        ),
        diag(
            "airport",
            "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport -Is",
            "airport",
            &[r"[\s\S]*"],
        ),
        diag(
            "known_networks",
            "networksetup -listpreferredwirelessnetworks {adapter}",
            "known_networks",
            &[r"\t(\S+)"],
        ),
        diag("wdutil", "wdutil info", "wdutil", &[]),
        diag(
            "throughput",
            "networkQuality",
            "throughput",
            &[r"Download capacity: .+", r"Upload capacity: .+"],
        ),
    ];

    let mut highlights = vec![
        rule("username", r"User Name: (.+)", "Started by:", plain()),
        rule("mac_address", r"ether (\S+)", "MAC address:", addresses(None)),
        rule(
            "ipv4_address",
            r"inet (\S+) netmask",
            "IPv4 address:",
            addresses(None),
        ),
        rule(
            "ipv6_address",
            r"inet6 (\S+:[0-9a-f]*) ",
            "IPv6 address:",
            addresses(Some("! No valid IPv6 address")),
        ),
        rule(
            "ra_received",
            r"ff02::1: ICMP6, router advertisement",
            "RA messages received:",
            ra_count(),
        ),
        rule(
            "dl_throughput",
            r"Download capacity: (\S+ \S+)",
            "DL throughput:",
            plain(),
        ),
        rule(
            "ul_throughput",
            r"Upload capacity: (\S+ \S+)",
            "UL throughput:",
            plain(),
        ),
        rule("ssid", r" SSID: (\S+)", "SSID:", spaced()),
        rule(
            "bssid_from_logs",
            r#""IO80211BSSID" = <(\S+)>"#,
            "BSSID:",
            FormattingStrategy::Regroup {
                width: 2,
                max_groups: 6,
                separator: ":".to_string(),
                failure_message: "! Failed parsing BSSID from logs".to_string(),
            },
        ),
        rule("rssi", r"Signal / Noise: (\S+ dBm)", "RSSI:", plain()),
        rule("noise", r"Signal / Noise: .+ / (\S+ dBm)", "Noise:", plain()),
        rule("channel", r"Channel: (\d+)", "Channel:", plain()),
        rule(
            "computer_name",
            r"Computer Name: (.+)",
            "Computer Name:",
            spaced(),
        ),
        rule(
            "macos_version",
            r"System Version: (.+)",
            "System Version:",
            plain(),
        ),
        rule(
            "time_since_boot",
            r"Time since boot: (.+)",
            "Time since boot:",
            plain(),
        ),
    ];
    highlights.extend(outcome_rules());

    Profile {
        settings,
        diagnostics,
        tests: universal_tests(),
        highlights,
    }
}

fn linux_preset() -> Profile {
    let (capture_command, capture_check_command, capture_output_filter) = capture_settings();

    let settings = Settings {
        ping_arguments: "-c 20".to_string(),
        good_ping_pattern: " 0% packet loss".to_string(),
        traceroute_arguments: "-I".to_string(),
        route_get_ipv4_command: "ip route get".to_string(),
        route_get_ipv6_command: "ip -6 route get".to_string(),
        curl_ipv4_command: "curl -4Is".to_string(),
        curl_ipv6_command: "curl -6Is".to_string(),
        get_gateway_ipv4_command: "ip -4 route list".to_string(),
        get_gateway_ipv6_command: "ip -6 route list".to_string(),
        gateway_ipv4_regex: r"default via (\S+)".to_string(),
        gateway_ipv6_regex: r"default via (\S+)".to_string(),
        capture_command,
        capture_check_command,
        capture_output_filter,
        capture_window_secs: 90,
        capture_check_timeout_secs: 5,
        capture_settle_ms: 1000,
        subprocess_timeout_secs: 30,
        max_parallel: 5,
    };

    let diagnostics = vec![
        diag("journalctl", "journalctl -S -10m", "log_journalctl", &[]),
        diag(
            "ip_addr",
            "ip addr show {adapter}",
            "ip_addr",
            &[r"ether \S+", r"inet6 .+", r"inet .+"],
        ),
        diag("public_ip", "curl -s ifconfig.me", "public_ip", &[r"\S+"]),
        diag(
            "gateway_ipv4",
            "ip -4 route list type unicast dev {adapter}",
            "gateway4",
            &[r"default via \S+"],
        ),
        diag(
            "gateway_ipv6",
            "ip -6 route list type unicast dev {adapter}",
            "gateway6",
            &[r"default via \S+"],
        ),
        diag(
            "ip_route_table",
            "ip route show table all",
            "ip_route_table",
            &[r"default via \S+ dev \S+"],
        ),
        diag("user_login", "id", "user_login", &[r"uid=\S+"]),
        diag("boot_time", "who -b", "boot_time", &[r"system boot.+"]),
        diag("iw_dev", "iw dev", "iw_dev", &[r"ssid \S+", r"channel .+"]),
        diag(
            "iwconfig",
            "iwconfig {adapter}",
            "iwconfig",
            &[
                r"Access Point: \S+",
                r"Link Quality=\S+",
                r"Signal level=\S+ dBm",
            ],
        ),
        diag(
            "supported_channels",
            "iwlist {adapter} channel",
            "supported_channels",
            &[],
        ),
        diag(
            "hostnamectl",
            "hostnamectl",
            "hostnamectl",
            &[
                r"Static hostname: \S+",
                r"Operating System: .*",
                r"Kernel: .*",
                r"Architecture: \S+",
                r"Hardware Vendor: .*",
                r"Hardware Model: .*",
            ],
        ),
        diag(
            "adapter_info",
            "nmcli -f GENERAL dev show {adapter}",
            "adapter_info",
            &[
                r"DEVICE:.+",
                r"VENDOR:.+",
                r"PRODUCT:.+",
                r"DRIVER:.+",
                r"DRIVER-VERSION:.+",
            ],
        ),
        diag("wifi_list", "nmcli device wifi list", "wifi_list", &[]),
    ];

    let mut highlights = vec![
        rule("mac_address", r"ether (\S+)", "MAC address:", addresses(None)),
        rule(
            "ipv4_address",
            r"inet (\S+)/.{0,2} brd",
            "IPv4 address:",
            addresses(None),
        ),
        rule(
            "ipv6_address",
            r"inet6 (\S+:[0-9a-f]*)/",
            "IPv6 address:",
            addresses(Some("! No valid IPv6 address")),
        ),
        rule(
            "ra_received",
            r"ip6-allnodes: ICMP6, router advertisement",
            "RA messages received:",
            ra_count(),
        ),
        rule("ssid", r"ssid (\S+)", "SSID:", spaced()),
        rule("bssid", r"Access Point: (\S+)", "BSSID:", plain()),
        rule(
            "signal_level",
            r"Signal level=(\S+) dBm",
            "Signal level:",
            plain(),
        ),
        rule(
            "link_quality",
            r"Link Quality=(\S+)",
            "Link Quality:",
            plain(),
        ),
        rule("channel", r"channel (.+)", "Channel:", plain()),
        rule(
            "computer_name",
            r"Static hostname: (\S+)",
            "Computer Name:",
            spaced(),
        ),
        rule("user_login", r"uid=\d+\((\S+)\)", "Login:", plain()),
        rule("boot_time", r"system boot + (.*)", "Boot time:", plain()),
        rule("os_version", r"Operating System: (.*)", "OS version:", plain()),
        rule("kernel", r"Kernel: (.*)", "Kernel:", plain()),
        rule(
            "hardware_name",
            r"Hardware Vendor: (.*)",
            "Hardware vendor:",
            plain(),
        ),
        rule(
            "hardware_model",
            r"Hardware Model: (.*)",
            "Hardware model:",
            plain(),
        ),
        rule("adapter_vendor", r"VENDOR: + (.*)", "Adapter vendor:", plain()),
        rule("adapter_model", r"PRODUCT: + (.*)", "Adapter model:", plain()),
        rule("adapter_driver", r"DRIVER: + (.*)", "Adapter driver:", plain()),
    ];
    highlights.extend(outcome_rules());

    Profile {
        settings,
        diagnostics,
        tests: universal_tests(),
        highlights,
    }
}

/// Information about a preset for listing.
#[derive(Debug, Clone, Serialize)]
pub struct PresetInfo {
    pub name: String,
    pub description: String,
    pub diagnostics: usize,
    pub tests: usize,
    pub highlights: usize,
}

impl PresetInfo {
    /// Create preset info from a preset name.
    pub fn from_preset(name: PresetName) -> Self {
        let profile = get_preset(name);
        PresetInfo {
            name: name.as_str().to_string(),
            description: name.description().to_string(),
            diagnostics: profile.diagnostics.len(),
            tests: profile.tests.len(),
            highlights: profile.highlights.len(),
        }
    }
}

/// List all available presets with their descriptions.
pub fn list_presets() -> Vec<PresetInfo> {
    PresetName::ALL
        .iter()
        .map(|&name| PresetInfo::from_preset(name))
        .collect()
}
