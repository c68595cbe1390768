//! Report synthesis: narrative, highlight digest, score and artifacts.
//!
//! [`synthesize`] is pure: identical inputs give byte-identical narrative,
//! digest, JSON and Markdown. Only [`SynthesizedReport::write_artifacts`]
//! touches the filesystem.

pub mod highlights;
pub mod markdown;
pub mod narrative;
pub mod score;

pub use highlights::{compile_rules, highlight_lines, CompiledRule};
pub use markdown::render_markdown;
pub use narrative::render_narrative;
pub use score::{Score, ScoreTally};

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use yfi_common::RunStamp;
use yfi_config::ConfigSnapshot;

use crate::capabilities::{ConflictRecord, HostFacts};
use crate::capture::CaptureResult;
use crate::collect::{CatalogResults, DiagnosticResult, TestResult};
use crate::logging::event_names;

/// `Started at:` timestamp layout.
const STARTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Who, when and with what the report was produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    /// Header line, e.g. `Yet Another Wi-Fi Diagnostic Tool v1.5.0`.
    pub tool: String,
    pub run_id: String,
    pub diag_name: String,
    pub started_at: DateTime<Local>,
    pub host: HostFacts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSnapshot>,
}

/// Everything collected in one run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub conflicts: ConflictRecord,
    pub diagnostics: CatalogResults<DiagnosticResult>,
    pub tests: CatalogResults<TestResult>,
    pub capture: CaptureResult,
}

/// A report with its narrative, digest and score worked out.
#[derive(Debug, Clone)]
pub struct SynthesizedReport {
    pub report: Report,
    pub narrative: String,
    /// Rule outputs in rule order, each starting with `\n`.
    pub highlights: Vec<String>,
    pub tally: ScoreTally,
    /// The block printed to the operator.
    pub digest: String,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    #[serde(flatten)]
    report: &'a Report,
    score: &'a ScoreTally,
    highlights: &'a [String],
}

/// Where [`SynthesizedReport::write_artifacts`] put its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub summary: PathBuf,
    pub json: PathBuf,
    pub markdown: PathBuf,
}

impl ReportPaths {
    pub fn in_dir(dir: &Path, stamp: &RunStamp) -> Self {
        ReportPaths {
            summary: dir.join(format!("0_summary_{}.txt", stamp)),
            json: dir.join(format!("1_report_{}.json", stamp)),
            markdown: dir.join(format!("1_markdown_{}.md", stamp)),
        }
    }
}

/// Merge the three result sets, run the highlight and scoring passes, and
/// assemble the digest.
pub fn synthesize(
    meta: ReportMeta,
    conflicts: ConflictRecord,
    diagnostics: CatalogResults<DiagnosticResult>,
    tests: CatalogResults<TestResult>,
    capture: CaptureResult,
    rules: &[CompiledRule],
) -> SynthesizedReport {
    let narrative = render_narrative(&diagnostics, &tests, &capture);
    let highlights = highlight_lines(rules, &narrative);
    let tally = ScoreTally::from_narrative(&narrative);

    let mut digest = String::from("\n--- ");
    digest.push_str(&format!(
        "\nStarted at: {}",
        meta.started_at.format(STARTED_AT_FORMAT)
    ));
    for line in &highlights {
        digest.push_str(line);
    }
    digest.push_str(&format!("\n\n{}", tally.score.headline()));
    digest.push_str(&format!("\n{}", tally.passed_line()));
    digest.push_str("\n--- \n");

    SynthesizedReport {
        report: Report {
            meta,
            conflicts,
            diagnostics,
            tests,
            capture,
        },
        narrative,
        highlights,
        tally,
        digest,
    }
}

impl SynthesizedReport {
    pub fn score(&self) -> Score {
        self.tally.score
    }

    /// Header line, digest, then the full narrative.
    pub fn summary_text(&self) -> String {
        format!("{}\n{}{}", self.report.meta.tool, self.digest, self.narrative)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&JsonRecord {
            report: &self.report,
            score: &self.tally,
            highlights: &self.highlights,
        })
    }

    pub fn to_markdown(&self) -> String {
        render_markdown(
            &self.report.meta.tool,
            &self.digest,
            &self.report.diagnostics,
            &self.report.tests,
            &self.report.capture,
        )
    }

    /// Write summary, JSON and Markdown into `dir`.
    pub fn write_artifacts(&self, dir: &Path, stamp: &RunStamp) -> io::Result<ReportPaths> {
        let paths = ReportPaths::in_dir(dir, stamp);
        fs::write(&paths.summary, self.summary_text())?;
        fs::write(&paths.json, self.to_json()?)?;
        fs::write(&paths.markdown, self.to_markdown())?;
        info!(
            event = event_names::REPORT_WRITTEN,
            dir = %dir.display(),
            score = %self.tally.score,
            "report written"
        );
        Ok(paths)
    }
}
