//! Error types for yfi.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! Unit-level probe failures (a ping that loses packets, a missing command, a
//! timed out traceroute) are not errors in this sense: they are recorded as
//! statuses in the report. The variants here are the conditions that stop a
//! command from producing a report at all.
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Unsupported System
//!   Reason: unsupported system: freebsd
//!   Fix: Run yfi on macOS (darwin) or Linux, or supply a config with a matching profile.
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for yfi operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors (parse, schema, validation).
    Config,
    /// Probe scheduling and collection errors.
    Collection,
    /// Report rendering and persistence errors.
    Report,
    /// File I/O and serialization errors.
    Io,
    /// Platform compatibility errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Collection => write!(f, "collection"),
            ErrorCategory::Report => write!(f, "report"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Unified error type for yfi.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    // Collection errors (20-29)
    #[error("worker pool could not schedule any work: {0}")]
    PoolUnavailable(String),

    // Report errors (40-49)
    #[error("cannot create output directory {path}: {reason}")]
    OutputDirectory { path: String, reason: String },

    #[error("report rendering failed: {0}")]
    Report(String),

    #[error("archive creation failed: {0}")]
    Archive(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported system: {os}")]
    UnsupportedSystem { os: String },

    #[error("host discovery failed: {0}")]
    HostDiscovery(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Collection errors
    /// - 40-49: Report errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::SchemaValidation(_) => 12,
            Error::PoolUnavailable(_) => 21,
            Error::OutputDirectory { .. } => 40,
            Error::Report(_) => 41,
            Error::Archive(_) => 42,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedSystem { .. } => 70,
            Error::HostDiscovery(_) => 71,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) | Error::SchemaValidation(_) => {
                ErrorCategory::Config
            }

            Error::PoolUnavailable(_) => ErrorCategory::Collection,

            Error::OutputDirectory { .. } | Error::Report(_) | Error::Archive(_) => {
                ErrorCategory::Report
            }

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

            Error::UnsupportedSystem { .. } | Error::HostDiscovery(_) => ErrorCategory::Platform,
        }
    }

    /// Returns whether this error is potentially recoverable by the operator.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) | Error::SchemaValidation(_) => true,

            Error::PoolUnavailable(_) => true, // resource pressure, retry later

            Error::OutputDirectory { .. } => true, // permissions or disk space
            Error::Report(_) => false,
            Error::Archive(_) => true,

            Error::Io(_) => true,
            Error::Json(_) => false,

            Error::UnsupportedSystem { .. } => false,
            Error::HostDiscovery(_) => true, // pass --interface explicitly
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'yfi config validate' to check the configuration, or remove it to use built-in presets."
            }
            Error::InvalidConfig(_) => {
                "Fix the reported field, then run 'yfi config validate'. 'yfi config show' prints a valid starting point."
            }
            Error::SchemaValidation(_) => {
                "Ensure the config file matches the expected schema. See 'yfi config schema'."
            }

            Error::PoolUnavailable(_) => {
                "The system could not start worker threads. Lower --max-parallel or retry when the host is less loaded."
            }

            Error::OutputDirectory { .. } => {
                "Check permissions and free space, or choose another location with --output-root."
            }
            Error::Report(_) => "Internal rendering failure. Report it with the run's log file attached.",
            Error::Archive(_) => "The report folder is still complete. Share it directly or retry archiving.",

            Error::Io(_) => "Check disk space and permissions. Retry the operation.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' or restore from backup.",

            Error::UnsupportedSystem { .. } => {
                "Run yfi on macOS (darwin) or Linux, or supply a config with a matching profile."
            }
            Error::HostDiscovery(_) => {
                "Pass the wireless interface explicitly with --interface (for example wlan0 or en0)."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig(_) => "Invalid Configuration",
            Error::SchemaValidation(_) => "Schema Validation Failed",

            Error::PoolUnavailable(_) => "Worker Pool Unavailable",

            Error::OutputDirectory { .. } => "Output Directory Unavailable",
            Error::Report(_) => "Report Error",
            Error::Archive(_) => "Archive Error",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",

            Error::UnsupportedSystem { .. } => "Unsupported System",
            Error::HostDiscovery(_) => "Host Discovery Failed",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Remediation hint.
    pub remediation: String,

    /// Additional structured context (e.g., path, os).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::OutputDirectory { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::UnsupportedSystem { os } => {
                context.insert("os".to_string(), serde_json::json!(os));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            remediation: err.remediation().to_string(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
