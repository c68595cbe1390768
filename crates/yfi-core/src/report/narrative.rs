//! Plain-text narrative of everything collected.

use std::fmt::Write;

use crate::capture::CaptureResult;
use crate::collect::{CatalogResults, DiagnosticResult, TestResult};

/// Render diagnostics, tests and capture into the narrative the highlight
/// and scoring passes read.
pub fn render_narrative(
    diagnostics: &CatalogResults<DiagnosticResult>,
    tests: &CatalogResults<TestResult>,
    capture: &CaptureResult,
) -> String {
    let mut out = String::from("\n====Diagnostics====");
    for (name, diag) in diagnostics.iter() {
        let _ = write!(out, "\n--- \nTask: {}\nCommand: {}", name, diag.command);
        if !diag.extracted_facts.is_empty() {
            let _ = write!(out, "\n{}", diag.extracted_facts);
        }
    }

    out.push_str("\n\n====Tests====");
    for (name, subtasks) in tests.iter() {
        let _ = write!(out, "\n--- \nTest: {}", name);
        for (_, sub) in subtasks.iter() {
            let _ = write!(out, "\nCommand: {}", sub.executed_command);
            if !sub.status.is_empty() {
                let _ = write!(out, "\n{}", sub.status);
            }
        }
    }

    let _ = write!(
        out,
        "\n\n====Tcpdump====\nFilter: {}\n{}",
        capture.filter, capture.result
    );
    out
}
