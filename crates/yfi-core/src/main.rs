//! yfi - Wi-Fi diagnostics collector
//!
//! The entry point handles:
//! - A full collection run (default command)
//! - Capability checks without collecting
//! - Configuration inspection and validation
//! - Archive verification

use clap::{Args, Parser, Subcommand};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use yfi_bundle::BundleReader;
use yfi_common::{format_error_human, tool_banner, Error, OutputFormat, StructuredError, VERSION};
use yfi_core::capture::SystemClock;
use yfi_core::collect::ProcessRunner;
use yfi_core::config::{list_presets, load_config, Config};
use yfi_core::exit_codes::ExitCode;
use yfi_core::logging::{init_logging, LogConfig, LogFileSink, LogFormat};
use yfi_core::run::{check_only, execute, RunOptions};
use yfi_core::session::DEFAULT_OUTPUT_ROOT;

/// Yet Another Wi-Fi Diagnostic Tool
#[derive(Parser)]
#[command(name = "yfi")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Configuration file (overrides YFI_CONFIG_DIR and the XDG location)
    #[arg(long, global = true, env = "YFI_CONFIG")]
    config: Option<PathBuf>,

    /// Stdout format
    #[arg(long, short = 'f', global = true, default_value = "human")]
    format: OutputFormat,

    /// Increase console log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence console logging
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Console log format
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect diagnostics, run tests, capture, and write the report (default)
    Run(RunArgs),

    /// Run the capability checks only
    Check(CheckArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Inspect report archives
    Bundle(BundleArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Directory the report folder is created in
    #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
    output_root: PathBuf,

    /// Wireless adapter to use instead of the detected one
    #[arg(long, short = 'i')]
    interface: Option<String>,

    /// Maximum number of commands running at once
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=64))]
    max_parallel: Option<u64>,

    /// Per-command timeout (seconds)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Minimum capture duration (seconds)
    #[arg(long)]
    capture_window: Option<u64>,

    /// Do not start the background capture
    #[arg(long)]
    no_capture: bool,

    /// Do not zip the report folder
    #[arg(long)]
    no_archive: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Wireless adapter to use instead of the detected one
    #[arg(long, short = 'i')]
    interface: Option<String>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the resolved configuration)
        path: Option<PathBuf>,
    },

    /// Print the JSON schema of the configuration file
    Schema,

    /// List the built-in presets
    Presets,
}

#[derive(Args, Debug)]
struct BundleArgs {
    #[command(subcommand)]
    command: BundleCommands,
}

#[derive(Subcommand, Debug)]
enum BundleCommands {
    /// Verify every file of an archive against its manifest
    Verify {
        /// Archive path
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.verbose, cli.global.quiet, cli.global.log_format);
    let log_sink = init_logging(&log_config);

    let exit_code = match cli.command {
        None => run_collection(&cli.global, &RunArgs::with_defaults(), &log_sink),
        Some(Commands::Run(args)) => run_collection(&cli.global, &args, &log_sink),
        Some(Commands::Check(args)) => run_check(&cli.global, &args),
        Some(Commands::Config(args)) => run_config(&cli.global, &args),
        Some(Commands::Bundle(args)) => run_bundle(&cli.global, &args),
        Some(Commands::Version) => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

impl RunArgs {
    /// Arguments of a bare `yfi` invocation.
    fn with_defaults() -> Self {
        RunArgs {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            ..RunArgs::default()
        }
    }
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_collection(global: &GlobalOpts, args: &RunArgs, log_sink: &LogFileSink) -> ExitCode {
    let options = RunOptions {
        config_path: global.config.clone(),
        output_root: args.output_root.clone(),
        interface: args.interface.clone(),
        max_parallel: args.max_parallel.map(|n| n as usize),
        timeout: args.timeout,
        capture_window: args.capture_window,
        no_capture: args.no_capture,
        no_archive: args.no_archive,
        format: global.format,
    };

    let runner = ProcessRunner::new();
    let clock = SystemClock;
    let mut payload = io::stdout();
    let result = if global.format == OutputFormat::Human {
        execute(&options, &runner, &clock, log_sink, &mut io::stdout(), &mut payload)
    } else {
        execute(&options, &runner, &clock, log_sink, &mut io::stderr(), &mut payload)
    };

    match result {
        Ok(outcome) => ExitCode::from_score(outcome.report.score().percent()),
        Err(e) => output_error(global, &e),
    }
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> ExitCode {
    let runner = ProcessRunner::new();
    let result = if global.format == OutputFormat::Human {
        check_only(global.config.as_deref(), args.interface.as_deref(), &runner, &mut io::stdout())
    } else {
        check_only(global.config.as_deref(), args.interface.as_deref(), &runner, &mut io::stderr())
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => return output_error(global, &e),
    };

    match global.format {
        OutputFormat::Human => {
            println!("---");
            println!(
                "Host: {} (started by {}) on {}, adapter {}",
                report.host.username, report.host.started_by, report.host.os_type, report.host.adapter
            );
            match &report.profile {
                Some(name) => println!("Profile: {}", name),
                None => println!("Profile: none for {}", report.host.os_type),
            }
        }
        OutputFormat::Json => print_json(&report),
        OutputFormat::Md => {
            println!("#### {}\n", tool_banner());
            println!("| Check | Conflict | Message |\n|---|---|---|");
            for (check, outcome) in report.conflicts.iter() {
                println!("| `{}` | {} | {} |", check, outcome.conflict, outcome.message);
            }
        }
    }

    if report.profile.is_none() {
        return ExitCode::CapabilityError;
    }
    if report.conflicts.is_clean() {
        ExitCode::Clean
    } else {
        ExitCode::Degraded
    }
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => run_config_show(global),
        ConfigCommands::Validate { path } => {
            run_config_validate(global, path.as_deref().or(global.config.as_deref()))
        }
        ConfigCommands::Schema => {
            print_json(&schemars::schema_for!(Config));
            ExitCode::Clean
        }
        ConfigCommands::Presets => run_config_presets(global),
    }
}

/// Display the effective configuration (built-in presets when no file is found).
fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let resolved = match load_config(global.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => return output_error(global, &e.into()),
    };

    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "source": resolved.paths.source.to_string(),
            "path": resolved.paths.config.as_ref().map(|p| p.display().to_string()),
            "config": resolved.config,
        })),
        _ => {
            println!("Source: {}", resolved.paths.source);
            if let Some(path) = &resolved.paths.config {
                println!("Path: {}", path.display());
            }
            print_json(&resolved.config);
        }
    }
    ExitCode::Clean
}

fn run_config_validate(global: &GlobalOpts, path: Option<&Path>) -> ExitCode {
    match load_config(path) {
        Ok(resolved) => {
            match global.format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "status": "valid",
                    "source": resolved.paths.source.to_string(),
                    "path": resolved.paths.config.as_ref().map(|p| p.display().to_string()),
                    "schema_version": resolved.config.schema_version,
                })),
                _ => match &resolved.paths.config {
                    Some(path) => println!("Configuration is valid: {}", path.display()),
                    None => println!("Configuration is valid: built-in presets"),
                },
            }
            ExitCode::Clean
        }
        Err(e) => output_error(global, &e.into()),
    }
}

fn run_config_presets(global: &GlobalOpts) -> ExitCode {
    let presets = list_presets();
    match global.format {
        OutputFormat::Json => print_json(&presets),
        _ => {
            for preset in &presets {
                println!(
                    "{:<8} {} ({} diagnostics, {} tests, {} highlights)",
                    preset.name, preset.description, preset.diagnostics, preset.tests, preset.highlights
                );
            }
        }
    }
    ExitCode::Clean
}

fn run_bundle(global: &GlobalOpts, args: &BundleArgs) -> ExitCode {
    match &args.command {
        BundleCommands::Verify { path } => run_bundle_verify(global, path),
    }
}

fn run_bundle_verify(global: &GlobalOpts, path: &Path) -> ExitCode {
    let mut reader = match BundleReader::open(path) {
        Ok(reader) => reader,
        Err(e) => return output_error(global, &Error::Archive(e.to_string())),
    };
    let failures = reader.verify_all();
    let manifest = reader.manifest();

    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "run_id": manifest.run_id,
            "diag_name": manifest.diag_name,
            "files": manifest.file_count(),
            "bytes": manifest.total_bytes(),
            "failures": failures,
            "status": if failures.is_empty() { "ok" } else { "failed" },
        })),
        _ => {
            println!("Archive: {}", path.display());
            println!("Report: {} (run {})", manifest.diag_name, manifest.run_id);
            if failures.is_empty() {
                println!("All {} files verified", manifest.file_count());
            } else {
                println!("{} of {} files failed verification:", failures.len(), manifest.file_count());
                for failure in &failures {
                    println!("  {}", failure);
                }
            }
        }
    }

    if failures.is_empty() {
        ExitCode::Clean
    } else {
        ExitCode::Degraded
    }
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "tool": tool_banner(),
            "version": VERSION,
            "config_schema_version": yfi_config::CONFIG_SCHEMA_VERSION,
            "bundle_schema_version": yfi_bundle::BUNDLE_SCHEMA_VERSION,
        })),
        _ => {
            println!("yfi {}", VERSION);
            println!("{}", tool_banner());
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("cannot serialize output: {}", e),
    }
}

/// Report a fatal error on stderr and pick its exit code.
fn output_error(global: &GlobalOpts, error: &Error) -> ExitCode {
    let mut stderr = io::stderr();
    let _ = match global.format {
        OutputFormat::Json => writeln!(stderr, "{}", StructuredError::from(error).to_json()),
        _ => writeln!(stderr, "{}", format_error_human(error, stderr.is_terminal())),
    };
    ExitCode::from_error(error)
}
