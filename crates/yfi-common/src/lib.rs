//! yfi common types, run identifiers, and errors.
//!
//! This crate provides foundational types shared across the yfi crates:
//! - Run and artifact naming (stamps, diag names, run ids)
//! - The unified error taxonomy with stable codes
//! - Output format selection for the CLI

pub mod error;
pub mod id;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use id::{ArtifactStamp, DiagName, RunId, RunStamp};
pub use output::OutputFormat;

/// Human-facing tool name printed in report headers.
pub const TOOL_NAME: &str = "Yet Another Wi-Fi Diagnostic Tool";

/// Tool version reported in headers, manifests, and logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Report header line, e.g. `Yet Another Wi-Fi Diagnostic Tool v1.5.0`.
pub fn tool_banner() -> String {
    format!("{} v{}", TOOL_NAME, VERSION)
}
