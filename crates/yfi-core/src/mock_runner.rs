//! Scripted command runner for testing.
//!
//! [`ScriptedRunner`] answers commands from a table of prefix rules instead of
//! spawning processes, records every command it was asked to run, and hands
//! out [`ScriptedProcess`] handles for background captures.
//!
//! ```ignore
//! use yfi_core::mock_runner::{BackgroundScript, ScriptedRunner};
//! use yfi_core::collect::OutcomeStatus;
//!
//! let runner = ScriptedRunner::new()
//!     .respond("ping", OutcomeStatus::Ok, "3 packets received, 0% packet loss")
//!     .respond("ip -4 route", OutcomeStatus::Ok, "default via 10.0.0.1 dev wlan0")
//!     .with_background(BackgroundScript::RunsUntilTerminated);
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collect::process_runner::{
    BackgroundProcess, CommandRunner, ExecutionOutcome, OutcomeStatus, ProcessError,
};

/// How the next background process behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundScript {
    /// Runs until SIGTERM, then exits cleanly.
    RunsUntilTerminated,
    /// Ignores SIGTERM; only SIGKILL stops it.
    IgnoresTerminate,
    /// Already exited when first polled.
    ExitsImmediately { success: bool },
    /// The spawn itself fails.
    FailsToSpawn,
}

/// Signals delivered to a scripted background process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessLog {
    pub command: String,
    pub polls: usize,
    pub terminated: bool,
    pub killed: bool,
}

#[derive(Debug, Clone)]
struct Rule {
    prefix: String,
    status: OutcomeStatus,
    output: String,
}

/// A [`CommandRunner`] that never touches the operating system.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    panic_on: Vec<String>,
    calls: Mutex<Vec<String>>,
    background: Mutex<VecDeque<BackgroundScript>>,
    processes: Mutex<Vec<Arc<Mutex<ProcessLog>>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix`. Earlier rules win.
    pub fn respond(
        mut self,
        prefix: impl Into<String>,
        status: OutcomeStatus,
        output: impl Into<String>,
    ) -> Self {
        self.rules.push(Rule {
            prefix: prefix.into(),
            status,
            output: output.into(),
        });
        self
    }

    /// Panic when asked to run a command starting with `prefix`.
    pub fn panic_on(mut self, prefix: impl Into<String>) -> Self {
        self.panic_on.push(prefix.into());
        self
    }

    /// Queue the behavior of the next background spawn.
    pub fn with_background(self, script: BackgroundScript) -> Self {
        if let Ok(mut queue) = self.background.lock() {
            queue.push_back(script);
        }
        self
    }

    /// Every command passed to `run` or `run_shell`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Signal logs of every background process handed out.
    pub fn processes(&self) -> Vec<ProcessLog> {
        self.processes
            .lock()
            .map(|p| {
                p.iter()
                    .filter_map(|log| log.lock().ok().map(|l| l.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn answer(&self, command: &str, timeout: Duration) -> ExecutionOutcome {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.to_string());
        }
        if self.panic_on.iter().any(|p| command.starts_with(p.as_str())) {
            panic!("scripted panic for {}", command);
        }
        match self.rules.iter().find(|r| command.starts_with(r.prefix.as_str())) {
            Some(rule) => {
                let raw_output = match rule.status {
                    OutcomeStatus::TimedOut { .. } => OutcomeStatus::TimedOut {
                        secs: timeout.as_secs(),
                    }
                    .to_string(),
                    OutcomeStatus::Error => "Error".to_string(),
                    _ => rule.output.clone(),
                };
                let status = match rule.status {
                    OutcomeStatus::TimedOut { .. } => OutcomeStatus::TimedOut {
                        secs: timeout.as_secs(),
                    },
                    other => other,
                };
                ExecutionOutcome {
                    status,
                    executed_command: command.to_string(),
                    exit_code: match status {
                        OutcomeStatus::Ok => Some(0),
                        OutcomeStatus::NotOk => Some(1),
                        _ => None,
                    },
                    duration_ms: 0,
                    stdout_len: match status {
                        OutcomeStatus::Ok | OutcomeStatus::NotOk => raw_output.len(),
                        _ => 0,
                    },
                    raw_output,
                }
            }
            None => ExecutionOutcome::error(command),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str, timeout: Duration) -> ExecutionOutcome {
        self.answer(command, timeout)
    }

    fn run_shell(&self, command: &str, timeout: Duration) -> ExecutionOutcome {
        self.answer(command, timeout)
    }

    fn spawn_background(&self, command: &str) -> Result<Box<dyn BackgroundProcess>, ProcessError> {
        let script = self
            .background
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(BackgroundScript::RunsUntilTerminated);

        if script == BackgroundScript::FailsToSpawn {
            return Err(ProcessError::SpawnFailed {
                command: command.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "scripted spawn failure"),
            });
        }

        let log = Arc::new(Mutex::new(ProcessLog {
            command: command.to_string(),
            ..ProcessLog::default()
        }));
        if let Ok(mut processes) = self.processes.lock() {
            processes.push(Arc::clone(&log));
        }
        Ok(Box::new(ScriptedProcess { script, log }))
    }
}

/// Background process handed out by [`ScriptedRunner`].
#[derive(Debug)]
pub struct ScriptedProcess {
    script: BackgroundScript,
    log: Arc<Mutex<ProcessLog>>,
}

impl BackgroundProcess for ScriptedProcess {
    fn pid(&self) -> u32 {
        4242
    }

    fn poll_exit(&mut self) -> io::Result<Option<bool>> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| io::Error::other("process log poisoned"))?;
        log.polls += 1;
        Ok(match self.script {
            BackgroundScript::ExitsImmediately { success } => Some(success),
            _ if log.killed => Some(false),
            BackgroundScript::RunsUntilTerminated if log.terminated => Some(true),
            _ => None,
        })
    }

    fn terminate(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.terminated = true;
        }
    }

    fn kill(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.killed = true;
        }
    }
}
