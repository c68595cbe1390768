//! Criterion benchmarks for report synthesis.
//!
//! Inputs are synthetic so the benchmarks never spawn commands.

use chrono::{Local, TimeZone};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::PathBuf;
use yfi_config::{get_preset, PresetName};
use yfi_core::capabilities::{ConflictRecord, HostFacts};
use yfi_core::capture::{CaptureResult, CaptureState, NO_MESSAGES_CAPTURED};
use yfi_core::collect::{CatalogResults, DiagnosticResult, OutcomeStatus, SubTaskResult, TestResult};
use yfi_core::report::{compile_rules, highlight_lines, render_narrative, synthesize, ReportMeta};

const IFCONFIG: &str = "ether a4:83:e7:12:34:56\n\
    inet6 fe80::1c2b:3aff:fe4d:5e6f%en0 prefixlen 64 secured scopeid 0x6\n\
    inet6 2001:db8::5 prefixlen 64 autoconf secured\n\
    inet 192.168.1.23 netmask 0xffffff00 broadcast 192.168.1.255";

fn inputs(tests_per_target: usize) -> (
    CatalogResults<DiagnosticResult>,
    CatalogResults<TestResult>,
    CaptureResult,
) {
    let diagnostics = CatalogResults::from_entries(vec![(
        "ifconfig".to_string(),
        DiagnosticResult {
            command: "ifconfig en0".to_string(),
            extracted_facts: IFCONFIG.to_string(),
            status: OutcomeStatus::Ok,
        },
    )]);

    let tests = CatalogResults::from_entries(
        (0..tests_per_target)
            .map(|i| {
                let subtasks = ["ping", "ping6", "curl", "curl6"]
                    .iter()
                    .enumerate()
                    .map(|(j, token)| {
                        let status = if (i + j) % 3 == 0 { "Not OK" } else { "OK" };
                        (
                            token.to_string(),
                            SubTaskResult {
                                executed_command: format!("{} host{}.example", token, i),
                                status: status.to_string(),
                                outcome: OutcomeStatus::Ok,
                            },
                        )
                    })
                    .collect();
                (format!("target_{}", i), CatalogResults::from_entries(subtasks))
            })
            .collect(),
    );

    let capture = CaptureResult {
        state: CaptureState::Completed,
        executed_command: Some("tcpdump -i en0 -W 1 -G 90 -w dump.pcap".to_string()),
        read_command: Some("tcpdump -r dump.pcap icmp6 && ip6[40] == 134".to_string()),
        filter: "icmp6 && ip6[40] == 134".to_string(),
        result: NO_MESSAGES_CAPTURED.to_string(),
        pcap_path: PathBuf::from("dump.pcap"),
        history: vec![],
    };

    (diagnostics, tests, capture)
}

fn meta() -> ReportMeta {
    ReportMeta {
        tool: "Yet Another Wi-Fi Diagnostic Tool v1.5.0".to_string(),
        run_id: "run-bench".to_string(),
        diag_name: "bench_wifi_diag_260101_000000".to_string(),
        started_at: Local
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("unambiguous timestamp"),
        host: HostFacts {
            started_by: "root".to_string(),
            username: "bench".to_string(),
            os_type: "darwin".to_string(),
            adapter: "en0".to_string(),
        },
        config: None,
    }
}

fn bench_highlights(c: &mut Criterion) {
    let rules = compile_rules(&get_preset(PresetName::Darwin).highlights).expect("rules compile");
    let mut group = c.benchmark_group("report");

    for targets in [6usize, 60] {
        let (diagnostics, tests, capture) = inputs(targets);
        let narrative = render_narrative(&diagnostics, &tests, &capture);

        group.bench_with_input(BenchmarkId::new("highlight_lines", targets), &narrative, |b, n| {
            b.iter(|| black_box(highlight_lines(&rules, black_box(n))));
        });
    }

    group.finish();
}

fn bench_synthesize(c: &mut Criterion) {
    let rules = compile_rules(&get_preset(PresetName::Darwin).highlights).expect("rules compile");
    let (diagnostics, tests, capture) = inputs(6);

    c.bench_function("report/synthesize", |b| {
        b.iter(|| {
            let report = synthesize(
                meta(),
                ConflictRecord::new(),
                diagnostics.clone(),
                tests.clone(),
                capture.clone(),
                &rules,
            );
            black_box(report.digest);
        })
    });
}

criterion_group!(benches, bench_highlights, bench_synthesize);
criterion_main!(benches);
