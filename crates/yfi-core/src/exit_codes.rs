//! Exit codes for the yfi CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Operational outcomes (a report was produced)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use yfi_common::{Error, ErrorCategory};

/// Exit codes for yfi operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-1)
    // ========================================================================
    /// Every scored probe passed
    Clean = 0,

    /// Report produced, but some probes failed or the score is undeterminable
    Degraded = 1,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Host OS unsupported or no profile for it
    CapabilityError = 11,

    /// Permission denied (e.g. report root not writable)
    PermissionError = 12,

    /// Configuration missing, malformed or invalid
    ConfigError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for a finished run.
    pub fn from_score(score: Option<u32>) -> Self {
        match score {
            Some(100) => ExitCode::Clean,
            _ => ExitCode::Degraded,
        }
    }

    /// Map a fatal error to its exit code.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                ExitCode::PermissionError
            }
            Error::OutputDirectory { reason, .. } if reason.contains("ermission denied") => {
                ExitCode::PermissionError
            }
            _ => match err.category() {
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Platform => ExitCode::CapabilityError,
                ErrorCategory::Io | ErrorCategory::Report => ExitCode::IoError,
                ErrorCategory::Collection => ExitCode::InternalError,
            },
        }
    }

    /// Check if this exit code indicates a produced report (codes 0-1).
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the exit code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Degraded => "OK_DEGRADED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::CapabilityError => "ERR_CAPABILITY",
            ExitCode::PermissionError => "ERR_PERMISSION",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_score() {
        assert_eq!(ExitCode::from_score(Some(100)), ExitCode::Clean);
        assert_eq!(ExitCode::from_score(Some(75)), ExitCode::Degraded);
        assert_eq!(ExitCode::from_score(None), ExitCode::Degraded);
    }

    #[test]
    fn test_from_error() {
        assert_eq!(
            ExitCode::from_error(&Error::InvalidConfig("x".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from_error(&Error::UnsupportedSystem { os: "aix".into() }),
            ExitCode::CapabilityError
        );
        assert_eq!(
            ExitCode::from_error(&Error::OutputDirectory {
                path: "/var/tmp/yfi_reports".into(),
                reason: "Permission denied (os error 13)".into(),
            }),
            ExitCode::PermissionError
        );
        assert_eq!(
            ExitCode::from_error(&Error::PoolUnavailable("spawn".into())),
            ExitCode::InternalError
        );
    }

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Degraded.is_operational());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(ExitCode::IoError.is_internal_error());
        assert_eq!(ExitCode::ConfigError.to_string(), "ERR_CONFIG (13)");
    }
}
