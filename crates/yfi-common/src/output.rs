//! Output formats for command results.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported stdout formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Highlight digest and progress lines for a terminal (default)
    #[default]
    Human,

    /// Structured JSON report
    Json,

    /// Markdown report with collapsible sections
    Md,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Human => write!(f, "human"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Md => write!(f, "md"),
        }
    }
}
