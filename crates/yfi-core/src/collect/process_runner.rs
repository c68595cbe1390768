//! External command execution with timeout and outcome classification.
//!
//! Every probe in a catalog goes through [`ProcessRunner::run`]:
//!
//! - the command line is split on whitespace (no shell)
//! - stdout and stderr are captured in full and joined, stdout first
//! - a command that outlives its timeout gets SIGTERM, then SIGKILL after a
//!   short grace period
//! - every failure is folded into an [`ExecutionOutcome`]; nothing here
//!   returns an error to the caller
//!
//! [`ProcessRunner::run_shell`] runs through `sh -c` and is only used to read
//! the capture file back, where the output filter needs shell quoting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, instrument, trace, warn};

/// Grace period between SIGTERM and SIGKILL in milliseconds.
pub const SIGTERM_GRACE_MS: u64 = 500;

/// Raw output recorded for commands that could not be run at all.
pub const ERROR_OUTPUT: &str = "Error";

/// Errors that keep a command from producing an exit status.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command")]
    EmptyCommand,

    #[error("command failed to spawn: {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),
}

/// Classified result of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Exit code 0.
    Ok,
    /// Nonzero exit code, or killed by a signal.
    NotOk,
    /// Not found, not executable, or empty.
    Error,
    /// Still running when the timeout expired.
    TimedOut { secs: u64 },
}

impl OutcomeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, OutcomeStatus::Ok)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Ok => write!(f, "OK"),
            OutcomeStatus::NotOk => write!(f, "Not OK"),
            OutcomeStatus::Error => write!(f, "Error"),
            OutcomeStatus::TimedOut { secs } => write!(f, "Timeout expired ({} seconds)", secs),
        }
    }
}

/// Everything recorded about one command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: OutcomeStatus,

    /// stdout followed by stderr, lossy UTF-8. The timeout sentinel or
    /// [`ERROR_OUTPUT`] when there is no process output to keep.
    pub raw_output: String,

    pub executed_command: String,

    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,

    pub duration_ms: u64,

    /// Byte length of the stdout part of `raw_output`.
    #[serde(skip)]
    pub stdout_len: usize,
}

impl ExecutionOutcome {
    /// Outcome for a command that never ran.
    pub fn error(command: impl Into<String>) -> Self {
        ExecutionOutcome {
            status: OutcomeStatus::Error,
            raw_output: ERROR_OUTPUT.to_string(),
            executed_command: command.into(),
            exit_code: None,
            duration_ms: 0,
            stdout_len: 0,
        }
    }

    /// The stdout part of `raw_output`.
    pub fn stdout(&self) -> &str {
        self.raw_output.get(..self.stdout_len).unwrap_or("")
    }
}

/// Seam between the collection engine and the operating system.
///
/// [`ProcessRunner`] is the production implementation; tests substitute
/// scripted runners.
pub trait CommandRunner: Send + Sync {
    /// Run a whitespace-split command line.
    fn run(&self, command: &str, timeout: Duration) -> ExecutionOutcome;

    /// Run a command line through `sh -c`.
    fn run_shell(&self, command: &str, timeout: Duration) -> ExecutionOutcome;

    /// Start a long-running command with its output discarded.
    fn spawn_background(&self, command: &str) -> Result<Box<dyn BackgroundProcess>, ProcessError>;
}

/// A child process owned by its spawner until terminated.
pub trait BackgroundProcess: Send {
    fn pid(&self) -> u32;

    /// `None` while running; `Some(success)` once exited.
    fn poll_exit(&mut self) -> io::Result<Option<bool>>;

    /// Ask the process to stop (SIGTERM).
    fn terminate(&mut self);

    /// Force-stop and reap the process (SIGKILL).
    fn kill(&mut self);
}

/// Runs external commands for the collection engine.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Print the "not supported" notice on stderr for failed spawns.
    quiet: bool,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that only logs spawn failures.
    pub fn quiet() -> Self {
        ProcessRunner { quiet: true }
    }

    #[instrument(skip(self, command_line, command), fields(command = %command_line))]
    fn execute(
        &self,
        command_line: &str,
        command: Result<Command, ProcessError>,
        timeout: Duration,
    ) -> ExecutionOutcome {
        let start = Instant::now();

        let mut child = match command.and_then(|mut cmd| spawn_piped(&mut cmd, command_line)) {
            Ok(child) => child,
            Err(e) => {
                if !self.quiet {
                    eprintln!("<{}> is not supported or resulted in error", command_line);
                }
                warn!(command = %command_line, error = %e, "command is not supported or resulted in error");
                return ExecutionOutcome::error(command_line);
            }
        };

        let result = execute_with_timeout(&mut child, timeout);
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(captured) => {
                let status = if captured.timed_out {
                    OutcomeStatus::TimedOut {
                        secs: timeout.as_secs(),
                    }
                } else {
                    match captured.status {
                        Some(s) if s.success() => OutcomeStatus::Ok,
                        _ => OutcomeStatus::NotOk,
                    }
                };
                let (raw_output, stdout_len) = match status {
                    OutcomeStatus::TimedOut { .. } => (status.to_string(), 0),
                    _ => captured.combined_output(),
                };
                ExecutionOutcome {
                    status,
                    raw_output,
                    executed_command: command_line.to_string(),
                    exit_code: captured.status.and_then(|s| s.code()),
                    duration_ms,
                    stdout_len,
                }
            }
            Err(e) => {
                error!(command = %command_line, error = %e, "lost track of child process");
                ExecutionOutcome {
                    duration_ms,
                    ..ExecutionOutcome::error(command_line)
                }
            }
        };

        debug!(
            command = %command_line,
            status = %outcome.status,
            duration_ms,
            "command finished"
        );
        outcome
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &str, timeout: Duration) -> ExecutionOutcome {
        self.execute(command, build_command(command), timeout)
    }

    fn run_shell(&self, command: &str, timeout: Duration) -> ExecutionOutcome {
        let built = if command.trim().is_empty() {
            Err(ProcessError::EmptyCommand)
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            Ok(cmd)
        };
        self.execute(command, built, timeout)
    }

    #[instrument(skip(self))]
    fn spawn_background(&self, command: &str) -> Result<Box<dyn BackgroundProcess>, ProcessError> {
        let mut cmd = build_command(command)?;
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProcessError::SpawnFailed {
                command: command.to_string(),
                source,
            })?;
        debug!(pid = child.id(), "background process started");
        Ok(Box::new(ChildProcess { child }))
    }
}

/// Split a command line into program and arguments.
pub fn split_command(command: &str) -> Option<(&str, Vec<&str>)> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?;
    Some((program, parts.collect()))
}

fn build_command(command: &str) -> Result<Command, ProcessError> {
    let (program, args) = split_command(command).ok_or(ProcessError::EmptyCommand)?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    // Patterns are written against untranslated tool output.
    cmd.env("LC_ALL", "C");
    Ok(cmd)
}

fn spawn_piped(cmd: &mut Command, command_line: &str) -> Result<Child, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::SpawnFailed {
            command: command_line.to_string(),
            source,
        })
}

struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: Option<ExitStatus>,
    timed_out: bool,
}

impl Captured {
    /// stdout then stderr, and where stdout ends.
    fn combined_output(&self) -> (String, usize) {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        let stdout_len = text.len();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        (text, stdout_len)
    }
}

/// Read a child's output until it exits or the deadline passes.
fn execute_with_timeout(child: &mut Child, timeout: Duration) -> Result<Captured, ProcessError> {
    let deadline = Instant::now() + timeout;
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    let mut chunk = vec![0u8; 8192];

    loop {
        if Instant::now() >= deadline {
            warn!(pid = child.id(), "command timed out, sending SIGTERM");
            kill_with_grace(child);
            let status = child.wait().ok();
            return Ok(Captured {
                stdout: stdout_buf,
                stderr: stderr_buf,
                status,
                timed_out: true,
            });
        }

        let mut did_read = false;

        if let Some(ref mut out) = stdout {
            if let Ok(n) = try_read_nonblocking(out, &mut chunk) {
                if n > 0 {
                    did_read = true;
                    stdout_buf.extend_from_slice(&chunk[..n]);
                }
            }
        }

        if let Some(ref mut err) = stderr {
            if let Ok(n) = try_read_nonblocking(err, &mut chunk) {
                if n > 0 {
                    did_read = true;
                    stderr_buf.extend_from_slice(&chunk[..n]);
                }
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                if let Some(ref mut out) = stdout {
                    let _ = drain(out, &mut stdout_buf);
                }
                if let Some(ref mut err) = stderr {
                    let _ = drain(err, &mut stderr_buf);
                }
                trace!(exit_code = ?status.code(), "process exited");
                return Ok(Captured {
                    stdout: stdout_buf,
                    stderr: stderr_buf,
                    status: Some(status),
                    timed_out: false,
                });
            }
            Ok(None) => {
                if !did_read {
                    thread::sleep(Duration::from_millis(10));
                }
            }
            Err(e) => {
                kill_with_grace(child);
                return Err(ProcessError::Wait(e));
            }
        }
    }
}

/// Drain whatever is immediately available from a stream.
///
/// Non-blocking so a grandchild still holding the pipe open cannot hang us.
#[cfg(unix)]
fn drain<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<()> {
    let mut chunk = vec![0u8; 8192];
    loop {
        match try_read_nonblocking(stream, &mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn drain(stream: &mut impl Read, buf: &mut Vec<u8>) -> io::Result<()> {
    stream.read_to_end(buf).map(|_| ())
}

/// Kill a process with SIGTERM, then SIGKILL after the grace period.
#[cfg(unix)]
fn kill_with_grace(child: &mut Child) {
    let pid = child.id() as i32;

    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    debug!(pid, "sent SIGTERM");

    thread::sleep(Duration::from_millis(SIGTERM_GRACE_MS));

    match child.try_wait() {
        Ok(Some(_)) => {
            trace!(pid, "process exited after SIGTERM");
        }
        Ok(None) => {
            warn!(pid, "process did not exit after SIGTERM, sending SIGKILL");
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
            let _ = child.wait();
        }
        Err(e) => {
            error!(pid, error = %e, "failed to check process status");
        }
    }
}

#[cfg(not(unix))]
fn kill_with_grace(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Try to read from a stream without blocking.
///
/// Sets O_NONBLOCK for the duration of one read and restores the original
/// flags. Returns Ok(0) if no data is available (EAGAIN/EWOULDBLOCK).
#[cfg(unix)]
fn try_read_nonblocking<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut [u8],
) -> io::Result<usize> {
    let fd = stream.as_raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let was_nonblocking = (flags & libc::O_NONBLOCK) != 0;
    if !was_nonblocking {
        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    let result = stream.read(buf);

    if !was_nonblocking {
        unsafe {
            libc::fcntl(fd, libc::F_SETFL, flags);
        }
    }

    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn try_read_nonblocking<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    stream.read(buf)
}

/// Production [`BackgroundProcess`].
struct ChildProcess {
    child: Child,
}

impl BackgroundProcess for ChildProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn poll_exit(&mut self) -> io::Result<Option<bool>> {
        Ok(self.child.try_wait()?.map(|status| status.success()))
    }

    #[cfg(unix)]
    fn terminate(&mut self) {
        unsafe {
            libc::kill(self.child.id() as i32, libc::SIGTERM);
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) {
        let _ = self.child.kill();
    }

    fn kill(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
