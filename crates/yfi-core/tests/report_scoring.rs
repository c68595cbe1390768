//! Report synthesis with the built-in linux highlight rules.

use chrono::{Local, TimeZone};
use std::path::PathBuf;
use yfi_config::{get_preset, PresetName};
use yfi_core::capabilities::{ConflictRecord, HostFacts};
use yfi_core::capture::{CaptureResult, CaptureState, CAPTURE_ERROR, NO_MESSAGES_CAPTURED};
use yfi_core::collect::{CatalogResults, DiagnosticResult, OutcomeStatus, SubTaskResult, TestResult};
use yfi_core::exit_codes::ExitCode;
use yfi_core::report::{compile_rules, synthesize, ReportMeta, Score, SynthesizedReport};

fn meta() -> ReportMeta {
    ReportMeta {
        tool: "Yet Another Wi-Fi Diagnostic Tool v1.5.0".to_string(),
        run_id: "run-00000000beef".to_string(),
        diag_name: "alice_wifi_diag_260301_090000".to_string(),
        started_at: Local.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        host: HostFacts {
            started_by: "root".to_string(),
            username: "alice".to_string(),
            os_type: "linux".to_string(),
            adapter: "wlan0".to_string(),
        },
        config: None,
    }
}

fn diagnostics() -> CatalogResults<DiagnosticResult> {
    CatalogResults::from_entries(vec![(
        "ip_addr".to_string(),
        DiagnosticResult {
            command: "ip addr show wlan0".to_string(),
            extracted_facts: "link/ether 3c:22:fb:00:11:22 brd ff:ff:ff:ff:ff:ff\n\
                              inet 192.168.1.23/24 brd 192.168.1.255"
                .to_string(),
            status: OutcomeStatus::Ok,
        },
    )])
}

fn tests(statuses: &[(&str, &str)]) -> CatalogResults<TestResult> {
    let subtasks = statuses
        .iter()
        .map(|(token, status)| {
            (
                token.to_string(),
                SubTaskResult {
                    executed_command: format!("{} google.com", token),
                    status: status.to_string(),
                    outcome: OutcomeStatus::Ok,
                },
            )
        })
        .collect();
    CatalogResults::from_entries(vec![(
        "google_com".to_string(),
        CatalogResults::from_entries(subtasks),
    )])
}

fn capture(state: CaptureState, result: &str) -> CaptureResult {
    CaptureResult {
        state,
        executed_command: None,
        read_command: None,
        filter: "icmp6 && ip6[40] == 134".to_string(),
        result: result.to_string(),
        pcap_path: PathBuf::from("/var/tmp/yfi_reports/x/dump.pcap"),
        history: vec![],
    }
}

fn synthesized(statuses: &[(&str, &str)], capture: CaptureResult) -> SynthesizedReport {
    let rules = compile_rules(&get_preset(PresetName::Linux).highlights).expect("rules compile");
    synthesize(
        meta(),
        ConflictRecord::new(),
        diagnostics(),
        tests(statuses),
        capture,
        &rules,
    )
}

#[test]
fn three_of_four_is_seventy_five() {
    let report = synthesized(
        &[("ping", "OK"), ("ping6", "Not OK"), ("curl", "OK"), ("curl6", "OK")],
        capture(CaptureState::Completed, NO_MESSAGES_CAPTURED),
    );

    assert_eq!(report.score(), Score::Percent(75));
    assert!(report.digest.contains("\nYour score: 75%\n3/4 tests passed\n"));
    assert!(report.digest.contains("\nNot OK:\nping6 google.com"));
    assert_eq!(ExitCode::from_score(report.score().percent()), ExitCode::Degraded);
}

#[test]
fn missing_ipv6_address_is_called_out() {
    let report = synthesized(&[("ping", "OK")], capture(CaptureState::Completed, NO_MESSAGES_CAPTURED));

    assert!(report.digest.contains("\nIPv4 address: 192.168.1.23"));
    assert!(report.digest.contains("\n! No valid IPv6 address"));
    assert!(report.digest.contains("\n! No RA messages captured"));
    assert_eq!(ExitCode::from_score(report.score().percent()), ExitCode::Clean);
}

#[test]
fn capture_failure_overrides_ra_count() {
    let report = synthesized(&[("ping", "OK")], capture(CaptureState::Failed, CAPTURE_ERROR));
    assert!(report.digest.contains("\n! Tcpdump error - check logs"));
    assert!(!report.digest.contains("No RA messages"));
}

#[test]
fn nothing_scored_is_undeterminable() {
    let report = synthesized(
        &[("route", "Saved to file")],
        capture(CaptureState::Completed, NO_MESSAGES_CAPTURED),
    );
    assert_eq!(report.score(), Score::Undeterminable);
    assert!(report.digest.contains("\nYour score: undeterminable\n0/0 tests passed\n"));
    assert_eq!(ExitCode::from_score(None), ExitCode::Degraded);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().expect("json")).expect("parse");
    assert_eq!(json["score"]["score"], "undeterminable");
}

#[test]
fn highlight_order_follows_rule_order() {
    let report = synthesized(
        &[("ping", "Not OK")],
        capture(CaptureState::Completed, NO_MESSAGES_CAPTURED),
    );
    let ipv4 = report.digest.find("IPv4 address:").expect("ipv4 line");
    let ipv6 = report.digest.find("! No valid IPv6 address").expect("ipv6 line");
    let failures = report.digest.find("Not OK:").expect("failures");
    assert!(ipv4 < ipv6 && ipv6 < failures);
}
