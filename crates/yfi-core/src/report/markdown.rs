//! Markdown rendering for pasting into tickets and wikis.

use std::fmt::Write;

use crate::capture::CaptureResult;
use crate::collect::{CatalogResults, DiagnosticResult, OutcomeStatus, TestResult};

/// Digest in a fenced block, then collapsible Diagnostics, Tests and
/// Tcpdump sections.
pub fn render_markdown(
    banner: &str,
    digest: &str,
    diagnostics: &CatalogResults<DiagnosticResult>,
    tests: &CatalogResults<TestResult>,
    capture: &CaptureResult,
) -> String {
    let mut out = String::new();
    let _ = write!(out, "#### {}\n```{}```\n\n", banner, digest);

    out.push_str("<details>\n  <summary>Diagnostics</summary>\n");
    for (name, diag) in diagnostics.iter() {
        let _ = write!(
            out,
            "\n\n---\n\n**Task:** `{}`</br>\n**Command:** `{}`</br>",
            name, diag.command
        );
        if !diag.extracted_facts.is_empty() {
            let _ = write!(out, "\n```\n{}\n```", diag.extracted_facts);
        }
    }
    out.push_str("\n</details>");

    out.push_str("<details>\n  <summary>Tests</summary>\n");
    for (name, subtasks) in tests.iter() {
        let _ = write!(out, "\n\n---\n\n**Test:** `{}`</br>", name);
        for (_, sub) in subtasks.iter() {
            let _ = write!(out, "\n**Command:** `{}`</br>", sub.executed_command);
            if sub.status == OutcomeStatus::NotOk.to_string() {
                let _ = write!(out, "\n```diff\n- {}\n```", sub.status);
            } else if !sub.status.is_empty() {
                let _ = write!(out, "\n```\n{}\n```", sub.status);
            }
        }
    }
    out.push_str("\n</details>");

    out.push_str("<details>\n  <summary>Tcpdump</summary>\n");
    let _ = write!(
        out,
        "\n**Filter:** `{}`\n\n```\n{}\n```\n</details>",
        capture.filter, capture.result
    );
    out
}
