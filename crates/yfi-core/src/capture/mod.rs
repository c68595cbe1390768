//! Background packet capture running alongside the collection pool.
//!
//! The coordinator owns one background capture process for the whole run:
//!
//! ```text
//! NotStarted -> Starting -> Running -> Terminating -> Completed
//!      \            \          \            \
//!       +------------+----------+------------+-> Failed
//! ```
//!
//! [`CaptureCoordinator::start`] spawns the process and returns immediately.
//! [`CaptureCoordinator::finish`] waits out whatever is left of the capture
//! window, stops the process and reads the filtered capture back. Time is read
//! through a [`Clock`] so tests can drive the window without sleeping.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use yfi_config::Settings;

use crate::capabilities::{ConflictRecord, CHECK_TCPDUMP};
use crate::collect::{BackgroundProcess, CommandRunner, ProcessError};
use crate::logging::event_names;

/// Result text when the capture could not be started, stopped or read.
pub const CAPTURE_ERROR: &str = "Tcpdump error";

/// Result text when the capture read back nothing matching the filter.
pub const NO_MESSAGES_CAPTURED: &str = "No RA messages captured";

/// Result text when the run was told not to capture.
pub const CAPTURE_DISABLED: &str = "Capture disabled";

/// Program used to read the capture file back.
const READ_PROGRAM: &str = "tcpdump";

/// Lifecycle of the background capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    NotStarted,
    Starting,
    Running,
    Terminating,
    Completed,
    Failed,
}

impl CaptureState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureState::Completed | CaptureState::Failed)
    }

    /// Whether `self -> next` is a legal step.
    pub fn can_transition_to(self, next: CaptureState) -> bool {
        use CaptureState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (NotStarted, Starting)
            | (Starting, Running)
            | (Running, Terminating)
            | (Terminating, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureState::NotStarted => "not_started",
            CaptureState::Starting => "starting",
            CaptureState::Running => "running",
            CaptureState::Terminating => "terminating",
            CaptureState::Completed => "completed",
            CaptureState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why the capture ended up in [`CaptureState::Failed`].
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture skipped: {0}")]
    Skipped(String),

    #[error("capture process could not be spawned: {0}")]
    Spawn(#[from] ProcessError),

    #[error("capture process exited with a failure status right after start")]
    ExitedEarly,

    #[error("capture process could not be polled: {0}")]
    Poll(#[source] io::Error),

    #[error("capture file could not be read: {0}")]
    Read(String),

    #[error("illegal capture transition {from} -> {to}")]
    InvalidTransition { from: CaptureState, to: CaptureState },
}

/// What the capture produced, as recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureResult {
    pub state: CaptureState,
    pub executed_command: Option<String>,
    pub read_command: Option<String>,
    pub filter: String,
    pub result: String,
    pub pcap_path: PathBuf,

    /// Every state visited, in order.
    pub history: Vec<CaptureState>,
}

impl CaptureResult {
    /// A capture that never ran, e.g. for `check`-only reports.
    pub fn not_run(filter: impl Into<String>, pcap_path: impl Into<PathBuf>) -> Self {
        CaptureResult {
            state: CaptureState::Failed,
            executed_command: None,
            read_command: None,
            filter: filter.into(),
            result: CAPTURE_DISABLED.to_string(),
            pcap_path: pcap_path.into(),
            history: vec![CaptureState::NotStarted, CaptureState::Failed],
        }
    }
}

/// Capture parameters taken from the profile settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Command the pcap path is appended to.
    pub command: String,
    pub filter: String,
    pub window: Duration,
    pub settle: Duration,
    pub read_timeout: Duration,
}

impl CaptureSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        CaptureSettings {
            command: settings.capture_command.clone(),
            filter: settings.capture_output_filter.clone(),
            window: Duration::from_secs(settings.capture_window_secs),
            settle: Duration::from_millis(settings.capture_settle_ms),
            read_timeout: Duration::from_secs(settings.subprocess_timeout_secs),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

/// Drives one background capture through its state machine.
pub struct CaptureCoordinator<'a> {
    runner: &'a dyn CommandRunner,
    clock: &'a dyn Clock,
    settings: CaptureSettings,
    pcap_path: PathBuf,
    run_started: Instant,
    state: CaptureState,
    history: Vec<CaptureState>,
    started_at: Option<Instant>,
    executed_command: Option<String>,
    process: Option<Box<dyn BackgroundProcess>>,
    failure: Option<String>,
}

impl<'a> CaptureCoordinator<'a> {
    /// `run_started` is when the whole run began; the window is measured
    /// from the later of that and the capture start.
    pub fn new(
        runner: &'a dyn CommandRunner,
        clock: &'a dyn Clock,
        settings: CaptureSettings,
        pcap_path: impl Into<PathBuf>,
        run_started: Instant,
    ) -> Self {
        CaptureCoordinator {
            runner,
            clock,
            settings,
            pcap_path: pcap_path.into(),
            run_started,
            state: CaptureState::NotStarted,
            history: vec![CaptureState::NotStarted],
            started_at: None,
            executed_command: None,
            process: None,
            failure: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn history(&self) -> &[CaptureState] {
        &self.history
    }

    pub fn pcap_path(&self) -> &Path {
        &self.pcap_path
    }

    /// The error that moved the capture to `Failed`, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Spawn the capture unless a capture conflict was recorded.
    ///
    /// Returns once the settle delay has passed and the process has been
    /// polled once. On error the coordinator is already `Failed`.
    #[instrument(skip_all, fields(pcap = %self.pcap_path.display()))]
    pub fn start(&mut self, conflicts: &ConflictRecord) -> Result<(), CaptureError> {
        if let Some(message) = conflicts.conflict_message(CHECK_TCPDUMP) {
            warn!(
                event = event_names::CAPTURE_SKIPPED,
                reason = message,
                "not starting capture due to a recorded conflict"
            );
            return Err(self.fail(CaptureError::Skipped(message.to_string())));
        }

        self.transition(CaptureState::Starting)?;
        self.started_at = Some(self.clock.now());

        let command = format!("{} {}", self.settings.command, self.pcap_path.display());
        self.executed_command = Some(command.clone());
        info!(event = event_names::CAPTURE_STARTED, command = %command, "starting capture");

        let mut process = match self.runner.spawn_background(&command) {
            Ok(p) => p,
            Err(e) => return Err(self.fail(CaptureError::Spawn(e))),
        };

        self.clock.sleep(self.settings.settle);
        let pid = process.pid();
        let polled = process.poll_exit();
        self.process = Some(process);
        match polled {
            Ok(Some(false)) => return Err(self.fail(CaptureError::ExitedEarly)),
            // Left as Running: the file is still read back at finish.
            Ok(Some(true)) => warn!(pid, "capture process already exited cleanly"),
            Ok(None) => debug!(pid, "capture process alive"),
            Err(e) => return Err(self.fail(CaptureError::Poll(e))),
        }

        self.transition(CaptureState::Running)
    }

    /// Time left in the capture window, if any.
    pub fn remaining(&self) -> Option<Duration> {
        if self.state != CaptureState::Running {
            return None;
        }
        let left = self.settings.window.saturating_sub(self.elapsed());
        (!left.is_zero()).then_some(left)
    }

    /// Wait out the window, stop the capture and read it back.
    #[instrument(skip_all, fields(state = %self.state))]
    pub fn finish(&mut self) -> CaptureResult {
        match self.state {
            CaptureState::NotStarted => {
                debug!("capture was never started");
                let _ = self.transition(CaptureState::Failed);
                return self.result(None, CAPTURE_DISABLED.to_string());
            }
            CaptureState::Running => {}
            _ => {
                error!(state = %self.state, "not reading capture file");
                let _ = self.transition(CaptureState::Failed);
                return self.result(None, CAPTURE_ERROR.to_string());
            }
        }

        if let Some(wait) = self.remaining() {
            info!(
                event = event_names::CAPTURE_WAITING,
                wait_ms = wait.as_millis() as u64,
                "waiting for the capture window"
            );
            self.clock.sleep(wait);
        }

        if let Err(e) = self.transition(CaptureState::Terminating) {
            self.fail(e);
            return self.result(None, CAPTURE_ERROR.to_string());
        }
        self.stop_process();

        let read_command = format!(
            "{} '{}' -n -r {}",
            READ_PROGRAM,
            self.settings.filter,
            self.pcap_path.display()
        );
        info!(command = %read_command, "reading capture file");
        let outcome = self
            .runner
            .run_shell(&read_command, self.settings.read_timeout);

        if !outcome.status.is_ok() {
            error!(
                event = event_names::CAPTURE_FAILED,
                status = %outcome.status,
                output = %outcome.raw_output,
                "unable to read capture file"
            );
            self.fail(CaptureError::Read(outcome.status.to_string()));
            return self.result(Some(read_command), CAPTURE_ERROR.to_string());
        }

        let text = match outcome.stdout() {
            "" => NO_MESSAGES_CAPTURED.to_string(),
            out => out.to_string(),
        };
        let _ = self.transition(CaptureState::Completed);
        info!(
            event = event_names::CAPTURE_FINISHED,
            bytes = text.len(),
            "capture read back"
        );
        self.result(Some(read_command), text)
    }

    /// Elapsed window time: the shorter of time since capture start and
    /// time since run start.
    fn elapsed(&self) -> Duration {
        let now = self.clock.now();
        let since_run = now.saturating_duration_since(self.run_started);
        match self.started_at {
            Some(at) => since_run.min(now.saturating_duration_since(at)),
            None => since_run,
        }
    }

    /// SIGTERM, settle, then SIGKILL if the process is still alive.
    fn stop_process(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        process.terminate();
        info!(
            event = event_names::CAPTURE_TERMINATED,
            pid = process.pid(),
            "sent SIGTERM to capture"
        );

        self.clock.sleep(self.settings.settle);
        match process.poll_exit() {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(pid = process.pid(), "capture ignored SIGTERM, killing");
                process.kill();
            }
            Err(e) => {
                warn!(pid = process.pid(), error = %e, "capture poll failed, killing");
                process.kill();
            }
        }
    }

    fn transition(&mut self, next: CaptureState) -> Result<(), CaptureError> {
        if !self.state.can_transition_to(next) {
            return Err(CaptureError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = %self.state, to = %next, "capture transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed`, killing any live process. The message is kept and
    /// the error handed back for the caller to propagate.
    fn fail(&mut self, err: CaptureError) -> CaptureError {
        if !matches!(err, CaptureError::Skipped(_)) {
            error!(event = event_names::CAPTURE_FAILED, error = %err, "capture failed");
        }
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
        if !self.state.is_terminal() {
            self.state = CaptureState::Failed;
            self.history.push(CaptureState::Failed);
        }
        self.failure = Some(err.to_string());
        err
    }

    fn result(&self, read_command: Option<String>, result: String) -> CaptureResult {
        CaptureResult {
            state: self.state,
            executed_command: self.executed_command.clone(),
            read_command,
            filter: self.settings.filter.clone(),
            result,
            pcap_path: self.pcap_path.clone(),
            history: self.history.clone(),
        }
    }
}

impl Drop for CaptureCoordinator<'_> {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::OutcomeStatus;
    use crate::mock_runner::{BackgroundScript, ScriptedRunner};

    fn settings(window_secs: u64) -> CaptureSettings {
        CaptureSettings {
            command: "tcpdump -i wlan0 -w".to_string(),
            filter: "icmp6 && ip6[40] == 134".to_string(),
            window: Duration::from_secs(window_secs),
            settle: Duration::from_secs(1),
            read_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_transition_table() {
        use CaptureState::*;
        assert!(NotStarted.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Terminating));
        assert!(Terminating.can_transition_to(Completed));
        for s in [NotStarted, Starting, Running, Terminating] {
            assert!(s.can_transition_to(Failed));
        }
        assert!(!Running.can_transition_to(Starting));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Starting));
        assert!(!Starting.can_transition_to(Completed));
    }

    #[test]
    fn test_conflict_skips_capture() {
        let runner = ScriptedRunner::new();
        let clock = ManualClock::new();
        let mut conflicts = ConflictRecord::new();
        conflicts.record(CHECK_TCPDUMP, "Unable to start tcpdump");

        let mut capture =
            CaptureCoordinator::new(&runner, &clock, settings(90), "/tmp/d.pcap", clock.now());
        assert!(matches!(
            capture.start(&conflicts),
            Err(CaptureError::Skipped(_))
        ));
        assert_eq!(capture.state(), CaptureState::Failed);
        assert!(runner.processes().is_empty());

        let result = capture.finish();
        assert_eq!(result.result, CAPTURE_ERROR);
        assert_eq!(result.executed_command, None);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_early_failed_exit_is_terminal() {
        let runner =
            ScriptedRunner::new().with_background(BackgroundScript::ExitsImmediately { success: false });
        let clock = ManualClock::new();
        let mut capture =
            CaptureCoordinator::new(&runner, &clock, settings(90), "/tmp/d.pcap", clock.now());

        assert!(matches!(
            capture.start(&ConflictRecord::new()),
            Err(CaptureError::ExitedEarly)
        ));
        assert_eq!(
            capture.history(),
            [CaptureState::NotStarted, CaptureState::Starting, CaptureState::Failed]
        );
        assert_eq!(capture.finish().result, CAPTURE_ERROR);
    }

    #[test]
    fn test_spawn_failure_fails_capture() {
        let runner = ScriptedRunner::new().with_background(BackgroundScript::FailsToSpawn);
        let clock = ManualClock::new();
        let mut capture =
            CaptureCoordinator::new(&runner, &clock, settings(90), "/tmp/d.pcap", clock.now());
        assert!(matches!(
            capture.start(&ConflictRecord::new()),
            Err(CaptureError::Spawn(_))
        ));
        assert_eq!(capture.state(), CaptureState::Failed);
    }

    #[test]
    fn test_finish_waits_out_window_then_reads() {
        let runner = ScriptedRunner::new().respond(
            "tcpdump 'icmp6",
            OutcomeStatus::Ok,
            "12:00:01 IP6 fe80::1 > ff02::1: ICMP6, router advertisement\n",
        );
        let clock = ManualClock::new();
        let mut capture =
            CaptureCoordinator::new(&runner, &clock, settings(5), "/tmp/d.pcap", clock.now());
        capture.start(&ConflictRecord::new()).unwrap();
        assert_eq!(capture.state(), CaptureState::Running);

        clock.advance(Duration::from_secs(1));
        assert_eq!(capture.remaining(), Some(Duration::from_secs(3)));

        let result = capture.finish();
        assert_eq!(result.state, CaptureState::Completed);
        assert!(result.result.contains("router advertisement"));
        assert_eq!(
            result.read_command.as_deref(),
            Some("tcpdump 'icmp6 && ip6[40] == 134' -n -r /tmp/d.pcap")
        );
        assert_eq!(
            result.executed_command.as_deref(),
            Some("tcpdump -i wlan0 -w /tmp/d.pcap")
        );
        // settle, remaining window, settle after SIGTERM
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(1)
            ]
        );
        let logs = runner.processes();
        assert!(logs[0].terminated);
        assert!(!logs[0].killed);
    }

    #[test]
    fn test_overshot_window_does_not_wait() {
        let runner = ScriptedRunner::new().respond("tcpdump '", OutcomeStatus::Ok, "");
        let clock = ManualClock::new();
        let mut capture =
            CaptureCoordinator::new(&runner, &clock, settings(5), "/tmp/d.pcap", clock.now());
        capture.start(&ConflictRecord::new()).unwrap();
        clock.advance(Duration::from_secs(60));

        assert_eq!(capture.remaining(), None);
        let result = capture.finish();
        assert_eq!(result.result, NO_MESSAGES_CAPTURED);
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn test_stubborn_process_is_killed() {
        let runner = ScriptedRunner::new()
            .respond("tcpdump '", OutcomeStatus::Ok, "")
            .with_background(BackgroundScript::IgnoresTerminate);
        let clock = ManualClock::new();
        let mut capture =
            CaptureCoordinator::new(&runner, &clock, settings(0), "/tmp/d.pcap", clock.now());
        capture.start(&ConflictRecord::new()).unwrap();
        capture.finish();

        let logs = runner.processes();
        assert!(logs[0].terminated);
        assert!(logs[0].killed);
    }

    #[test]
    fn test_read_failure_is_capture_error() {
        let runner =
            ScriptedRunner::new().respond("tcpdump '", OutcomeStatus::NotOk, "bad dump file");
        let clock = ManualClock::new();
        let mut capture =
            CaptureCoordinator::new(&runner, &clock, settings(0), "/tmp/d.pcap", clock.now());
        capture.start(&ConflictRecord::new()).unwrap();

        let result = capture.finish();
        assert_eq!(result.state, CaptureState::Failed);
        assert_eq!(result.result, CAPTURE_ERROR);
        assert_eq!(
            result.history.last(),
            Some(&CaptureState::Failed)
        );
        assert!(capture.failure().is_some());
    }

    #[test]
    fn test_never_started_is_disabled() {
        let runner = ScriptedRunner::new();
        let clock = ManualClock::new();
        let mut capture =
            CaptureCoordinator::new(&runner, &clock, settings(90), "/tmp/d.pcap", clock.now());
        let result = capture.finish();
        assert_eq!(result.result, CAPTURE_DISABLED);
        assert!(clock.sleeps().is_empty());
    }
}
