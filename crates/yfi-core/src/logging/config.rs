//! Logging configuration.
//!
//! Supports configuration via:
//! - Environment variables (YFI_LOG, RUST_LOG, YFI_LOG_FORMAT)
//! - CLI flags (-v, -q, --log-format)

use serde::{Deserialize, Serialize};

/// Log output format for the console layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format (default).
    #[default]
    Human,
    /// Machine-parseable JSON lines.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "console" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" | "structured" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Completely silent.
    Off,
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Standard operational info (default for the log file).
    #[default]
    Info,
    /// Debug information.
    Debug,
    /// Most verbose.
    Trace,
}

impl LogLevel {
    /// `steps` levels more verbose, saturating at trace.
    pub fn raise(self, steps: u8) -> LogLevel {
        let mut level = self;
        for _ in 0..steps {
            level = match level {
                LogLevel::Off => LogLevel::Error,
                LogLevel::Error => LogLevel::Warn,
                LogLevel::Warn => LogLevel::Info,
                LogLevel::Info => LogLevel::Debug,
                LogLevel::Debug | LogLevel::Trace => LogLevel::Trace,
            };
        }
        level
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" | "quiet" => Ok(LogLevel::Off),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Off => write!(f, "off"),
        }
    }
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
            LogLevel::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
            LogLevel::Info => tracing_subscriber::filter::LevelFilter::INFO,
            LogLevel::Warn => tracing_subscriber::filter::LevelFilter::WARN,
            LogLevel::Error => tracing_subscriber::filter::LevelFilter::ERROR,
            LogLevel::Off => tracing_subscriber::filter::LevelFilter::OFF,
        }
    }
}

/// Logging configuration.
///
/// `level` feeds the shared filter (and therefore the report's log file);
/// `console_level` additionally limits what reaches stderr, so a normal run
/// keeps the terminal for the digest.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Console output format.
    pub format: LogFormat,
    /// Minimum level recorded anywhere.
    pub level: LogLevel,
    /// Minimum level printed on stderr.
    pub console_level: LogLevel,
    /// Whether to include timestamps in human console output.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            console_level: LogLevel::Warn,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment and CLI flags.
    ///
    /// `verbose` is the `-v` count; `quiet` silences the console entirely.
    pub fn from_env(verbose: u8, quiet: bool, cli_format: Option<LogFormat>) -> Self {
        let mut config = LogConfig::default();

        // YFI_LOG takes precedence over RUST_LOG
        if let Ok(val) = std::env::var("YFI_LOG") {
            if let Ok(level) = val.parse::<LogLevel>() {
                config.level = level;
                config.console_level = config.console_level.min(level);
            }
        } else if let Ok(val) = std::env::var("RUST_LOG") {
            if val.contains("trace") {
                config.level = LogLevel::Trace;
            } else if val.contains("debug") {
                config.level = LogLevel::Debug;
            }
        }

        if let Ok(val) = std::env::var("YFI_LOG_FORMAT") {
            if let Ok(format) = val.parse::<LogFormat>() {
                config.format = format;
            }
        }

        if verbose > 0 {
            config.console_level = config.console_level.raise(verbose);
            config.level = config.level.max(config.console_level);
        }
        if quiet {
            config.console_level = LogLevel::Off;
        }
        if let Some(format) = cli_format {
            config.format = format;
        }

        config
    }

    /// Set console format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the shared level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Enable timestamps in human output.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}
