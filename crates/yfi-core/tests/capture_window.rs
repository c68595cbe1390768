//! Capture window timing on a manual clock.
//!
//! The coordinator must never signal the capture before the window has
//! elapsed on its clock, however long the catalogs took.

use proptest::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use yfi_core::capabilities::{ConflictRecord, CHECK_TCPDUMP};
use yfi_core::capture::{
    CaptureCoordinator, CaptureSettings, CaptureState, Clock, ManualClock, NO_MESSAGES_CAPTURED,
};
use yfi_core::collect::OutcomeStatus;
use yfi_core::mock_runner::{BackgroundScript, ScriptedRunner};

const SETTLE: Duration = Duration::from_secs(1);

fn settings(window: Duration) -> CaptureSettings {
    CaptureSettings {
        command: "tcpdump -i wlan0 -W 1 -G 90 -w".to_string(),
        filter: "icmp6 && ip6[40] == 134".to_string(),
        window,
        settle: SETTLE,
        read_timeout: Duration::from_secs(30),
    }
}

fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .respond("tcpdump 'icmp6", OutcomeStatus::Ok, "")
        .with_background(BackgroundScript::RunsUntilTerminated)
}

/// Clock time at which SIGTERM went out: everything slept or advanced
/// before the final settle delay.
fn terminated_at(clock: &ManualClock) -> Duration {
    clock.elapsed() - SETTLE
}

#[test]
fn waits_out_the_rest_of_the_window() {
    let clock = ManualClock::new();
    let runner = runner();
    let mut capture = CaptureCoordinator::new(
        &runner,
        &clock,
        settings(Duration::from_secs(5)),
        PathBuf::from("/tmp/dump.pcap"),
        clock.now(),
    );

    capture.start(&ConflictRecord::new()).expect("capture starts");
    clock.advance(Duration::from_secs(2));
    assert_eq!(capture.remaining(), Some(Duration::from_secs(2)));

    let result = capture.finish();
    assert_eq!(result.state, CaptureState::Completed);
    assert_eq!(result.result, NO_MESSAGES_CAPTURED);

    let slept: Duration = clock.sleeps()[..2].iter().sum();
    assert!(slept >= Duration::from_secs(3));
    assert!(terminated_at(&clock) >= Duration::from_secs(5));
    assert!(runner.processes()[0].terminated);
}

#[test]
fn overshoot_does_not_wait() {
    let clock = ManualClock::new();
    let runner = runner();
    let mut capture = CaptureCoordinator::new(
        &runner,
        &clock,
        settings(Duration::from_secs(5)),
        PathBuf::from("/tmp/dump.pcap"),
        clock.now(),
    );

    capture.start(&ConflictRecord::new()).expect("capture starts");
    clock.advance(Duration::from_secs(40));
    assert_eq!(capture.remaining(), None);

    capture.finish();
    assert_eq!(clock.sleeps(), [SETTLE, SETTLE]);
}

#[test]
fn conflict_never_spawns() {
    let clock = ManualClock::new();
    let runner = runner();
    let mut conflicts = ConflictRecord::new();
    conflicts.record(CHECK_TCPDUMP, "Unable to start tcpdump");

    let mut capture = CaptureCoordinator::new(
        &runner,
        &clock,
        settings(Duration::from_secs(5)),
        PathBuf::from("/tmp/dump.pcap"),
        clock.now(),
    );
    assert!(capture.start(&conflicts).is_err());
    assert_eq!(capture.remaining(), None);

    let result = capture.finish();
    assert_eq!(result.state, CaptureState::Failed);
    assert!(runner.processes().is_empty());
    assert!(clock.sleeps().is_empty());
}

proptest! {
    #[test]
    fn never_terminates_before_window(window_s in 0u64..120, work_ms in 0u64..150_000) {
        let clock = ManualClock::new();
        let runner = runner();
        let window = Duration::from_secs(window_s);
        let mut capture = CaptureCoordinator::new(
            &runner,
            &clock,
            settings(window),
            PathBuf::from("/tmp/dump.pcap"),
            clock.now(),
        );

        capture.start(&ConflictRecord::new()).expect("capture starts");
        clock.advance(Duration::from_millis(work_ms));
        let result = capture.finish();

        prop_assert_eq!(result.state, CaptureState::Completed);
        prop_assert!(terminated_at(&clock) >= window);
        prop_assert!(clock.sleeps().len() <= 3);
    }
}
