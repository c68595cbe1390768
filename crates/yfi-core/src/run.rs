//! One collection run, from host discovery to the archive.
//!
//! Order of work:
//! 1. load configuration, detect the host, create the report folder
//! 2. capability checks
//! 3. start the background capture
//! 4. diagnostics catalog, then tests catalog, on the bounded pool
//! 5. wait out the capture window, stop the capture and read it back
//! 6. synthesize and write the report, print the digest, archive the folder
//!
//! Progress lines go to `console`; the report payload goes to `payload`.
//! The CLI points both at stdout for human output and moves progress to
//! stderr when stdout carries JSON or Markdown.

use chrono::Local;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use yfi_bundle::{BundleManifest, BundleWriter};
use yfi_common::{tool_banner, Error, OutputFormat, Result, VERSION};

use crate::capabilities::{check_capabilities, ConflictRecord, HostFacts};
use crate::capture::{CaptureCoordinator, CaptureError, CaptureSettings, Clock};
use crate::collect::{compile_diagnostics, CommandRunner, DiagnosticsUnit, TaskPool, TestsUnit};
use crate::config::{load_config, ResolvedConfig, SelectedProfile};
use crate::log_event;
use crate::logging::{event_names, generate_run_id, LogContext, LogFileSink, Stage};
use crate::report::{compile_rules, synthesize, ReportMeta, ReportPaths, SynthesizedReport};
use crate::session::{RunSession, SessionError, DEFAULT_OUTPUT_ROOT};

/// Knobs for one run, usually straight from the CLI.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub output_root: PathBuf,
    /// Adapter override; skips adapter discovery.
    pub interface: Option<String>,
    pub max_parallel: Option<usize>,
    /// Per-command timeout in seconds.
    pub timeout: Option<u64>,
    /// Capture window in seconds.
    pub capture_window: Option<u64>,
    pub no_capture: bool,
    pub no_archive: bool,
    pub format: OutputFormat,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            config_path: None,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            interface: None,
            max_parallel: None,
            timeout: None,
            capture_window: None,
            no_capture: false,
            no_archive: false,
            format: OutputFormat::Human,
        }
    }
}

/// What a finished run left behind.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: SynthesizedReport,
    pub session: RunSession,
    pub paths: ReportPaths,
    /// `None` when archiving was disabled or failed.
    pub archive: Option<BundleManifest>,
    pub elapsed: Duration,
}

/// Result of a checks-only invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub host: HostFacts,
    pub conflicts: ConflictRecord,
    /// Profile name, when the host OS has one.
    pub profile: Option<String>,
}

/// Run a full collection.
///
/// Probe failures never fail the run; they show up in the report and the
/// score. Errors are returned only for conditions that leave nothing to
/// report on: bad configuration, no profile for the host, no report folder,
/// or no pool workers.
pub fn execute(
    options: &RunOptions,
    runner: &dyn CommandRunner,
    clock: &dyn Clock,
    log_sink: &LogFileSink,
    console: &mut dyn Write,
    payload: &mut dyn Write,
) -> Result<RunOutcome> {
    let started_at = Local::now();
    let run_started = clock.now();

    let resolved = load_config(options.config_path.as_deref())?;
    let host = detect_host(runner, options.interface.as_deref())?;
    let mut ctx = LogContext::new(generate_run_id(), host.os_type.clone());

    let session = RunSession::create(&options.output_root, &host, started_at)
        .map_err(session_error)?;
    if let Err(e) = log_sink.attach(&session.log_path()) {
        warn!(path = %session.log_path().display(), error = %e, "cannot open log file");
    }
    ctx = ctx.with_session_id(session.diag_name.as_str());
    log_event!(
        ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        format!("{} started by {}", tool_banner(), host.started_by),
        adapter = host.adapter.as_str()
    );
    session.ensure_ownership(runner, &host.username);

    if !resolved.is_builtin() {
        info!("external configuration file is being used");
        say(console, "External configuration file is being used");
    }
    let (selected, conflicts) = run_checks(runner, &resolved, &host, console);
    let mut selected = selected?;
    apply_overrides(&mut selected, options);
    let settings = &selected.profile.settings;

    say(console, "---");
    say(console, &format!("\n{}", tool_banner()));
    say(console, &format!("Results will be saved to {}", session.dir.display()));

    let diagnostics_catalog = compile_diagnostics(&selected.profile.diagnostics)
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let rules = compile_rules(&selected.profile.highlights)
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;

    let mut capture = CaptureCoordinator::new(
        runner,
        clock,
        CaptureSettings::from_settings(settings),
        session.pcap_path(),
        run_started,
    );
    if !options.no_capture {
        match capture.start(&conflicts) {
            Ok(()) | Err(CaptureError::Skipped(_)) => {}
            Err(_) => say(console, "Error while starting tcpdump, check logs"),
        }
    }

    let timeout = Duration::from_secs(settings.subprocess_timeout_secs);
    let pool = TaskPool::new(settings.max_parallel);

    say(console, "\nCollecting diagnostics...");
    let diagnostics = pool
        .run_all(
            &diagnostics_catalog,
            &DiagnosticsUnit::new(runner, &session.dir, timeout),
        )
        .map_err(|e| Error::PoolUnavailable(e.to_string()))?;

    say(console, "Performing tests...");
    let tests = pool
        .run_all(
            &selected.profile.tests,
            &TestsUnit::new(runner, settings, &session.dir, timeout),
        )
        .map_err(|e| Error::PoolUnavailable(e.to_string()))?;

    if let Some(remaining) = capture.remaining() {
        say(
            console,
            &format!(
                "\nWaiting extra {} seconds for tcpdump to finish its job...",
                ceil_secs(remaining)
            ),
        );
    }
    let capture_result = capture.finish();

    let meta = ReportMeta {
        tool: tool_banner(),
        run_id: ctx.run_id.clone(),
        diag_name: session.diag_name.to_string(),
        started_at,
        host: host.clone(),
        config: Some(resolved.snapshot(&selected)),
    };
    let report = synthesize(meta, conflicts, diagnostics, tests, capture_result, &rules);
    let paths = report
        .write_artifacts(&session.dir, &session.stamp)
        .map_err(|e| Error::Report(e.to_string()))?;

    emit_payload(&report, options.format, payload)?;

    let archive = if options.no_archive {
        None
    } else {
        write_archive(&session, &host, &ctx)
    };

    let elapsed = clock.now().saturating_duration_since(run_started);
    say(console, &format!("Completed in {} seconds", elapsed.as_secs()));
    say(console, &format!("Full logs saved to {}", session.dir.display()));

    log_event!(
        ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Report,
        "run finished",
        score = report.score().to_string(),
        duration_ms = elapsed.as_millis() as u64
    );
    log_sink.detach();

    Ok(RunOutcome {
        report,
        session,
        paths,
        archive,
        elapsed,
    })
}

/// Host discovery and capability checks only; nothing is written.
pub fn check_only(
    config_path: Option<&Path>,
    interface: Option<&str>,
    runner: &dyn CommandRunner,
    console: &mut dyn Write,
) -> Result<CheckReport> {
    let resolved = load_config(config_path)?;
    let host = detect_host(runner, interface)?;
    if !resolved.is_builtin() {
        say(console, "External configuration file is being used");
    }
    let (selected, conflicts) = run_checks(runner, &resolved, &host, console);
    Ok(CheckReport {
        host,
        conflicts,
        profile: selected.ok().map(|s| s.name),
    })
}

fn detect_host(runner: &dyn CommandRunner, interface: Option<&str>) -> Result<HostFacts> {
    HostFacts::detect(runner, interface).map_err(|e| Error::HostDiscovery(e.to_string()))
}

/// Print `Checking capabilities...`, run the checks and print every
/// conflict. The profile lookup error is returned only after the checks so
/// an unsupported host still sees why.
fn run_checks(
    runner: &dyn CommandRunner,
    resolved: &ResolvedConfig,
    host: &HostFacts,
    console: &mut dyn Write,
) -> (Result<SelectedProfile>, ConflictRecord) {
    say(console, "Checking capabilities...\n");
    let selected = resolved
        .select_profile(&host.os_type, &host.adapter)
        .map_err(Error::from);
    let conflicts = check_capabilities(
        runner,
        &resolved.config.supported_systems,
        selected.as_ref().ok().map(|s| &s.profile.settings),
        host,
    );
    for line in conflicts.summary_lines() {
        say(console, &line);
    }
    (selected, conflicts)
}

fn apply_overrides(selected: &mut SelectedProfile, options: &RunOptions) {
    let settings = &mut selected.profile.settings;
    if let Some(n) = options.max_parallel {
        settings.max_parallel = n;
    }
    if let Some(secs) = options.timeout {
        settings.subprocess_timeout_secs = secs;
    }
    if let Some(secs) = options.capture_window {
        settings.capture_window_secs = secs;
    }
}

fn emit_payload(
    report: &SynthesizedReport,
    format: OutputFormat,
    payload: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Human => writeln!(payload, "{}", report.digest)?,
        OutputFormat::Json => writeln!(payload, "{}", report.to_json()?)?,
        OutputFormat::Md => writeln!(payload, "{}", report.to_markdown())?,
    }
    payload.flush()?;
    Ok(())
}

/// Zip the report folder next to its contents. Failure is logged only.
fn write_archive(
    session: &RunSession,
    host: &HostFacts,
    ctx: &LogContext,
) -> Option<BundleManifest> {
    let archive_path = session.archive_path();
    let mut writer = BundleWriter::new(ctx.run_id.as_str(), session.diag_name.as_str())
        .with_tool_version(VERSION)
        .with_host(format!("{}/{}", host.os_type, host.adapter));

    let written = writer
        .add_dir(&session.dir, Some(&archive_path))
        .and_then(|_| writer.write(&archive_path));
    match written {
        Ok(manifest) => {
            log_event!(
                ctx,
                INFO,
                event_names::BUNDLE_WRITTEN,
                Stage::Bundle,
                "archive created",
                files = manifest.file_count() as u64,
                bytes = manifest.total_bytes()
            );
            Some(manifest)
        }
        Err(e) => {
            log_event!(
                ctx,
                ERROR,
                event_names::BUNDLE_FAILED,
                Stage::Bundle,
                "error while creating the archive",
                error = e.to_string()
            );
            None
        }
    }
}

fn session_error(err: SessionError) -> Error {
    Error::OutputDirectory {
        path: err.path().display().to_string(),
        reason: err.io_error().to_string(),
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn say(console: &mut dyn Write, line: &str) {
    // A closed console must not abort the collection.
    let _ = writeln!(console, "{}", line);
}
