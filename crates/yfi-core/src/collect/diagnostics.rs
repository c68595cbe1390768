//! Diagnostics catalog unit.

use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use yfi_common::ArtifactStamp;
use yfi_config::DiagnosticTask;

use super::extract::PatternSet;
use super::pool::CatalogUnit;
use super::process_runner::{CommandRunner, OutcomeStatus};
use super::{diag_artifact_name, persist_artifact};

/// A diagnostic task with its extraction patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledDiagnostic {
    pub task: DiagnosticTask,
    pub patterns: PatternSet,
}

/// Compile every task's expressions up front.
pub fn compile_diagnostics(
    tasks: &[DiagnosticTask],
) -> Result<Vec<CompiledDiagnostic>, regex::Error> {
    tasks
        .iter()
        .map(|task| {
            Ok(CompiledDiagnostic {
                patterns: PatternSet::compile(&task.expressions)?,
                task: task.clone(),
            })
        })
        .collect()
}

/// Result of one diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticResult {
    pub command: String,
    pub extracted_facts: String,
    pub status: OutcomeStatus,
}

/// Runs one diagnostic command, saves its output, and extracts facts.
pub struct DiagnosticsUnit<'a> {
    runner: &'a dyn CommandRunner,
    out_dir: &'a Path,
    timeout: Duration,
}

impl<'a> DiagnosticsUnit<'a> {
    pub fn new(runner: &'a dyn CommandRunner, out_dir: &'a Path, timeout: Duration) -> Self {
        DiagnosticsUnit {
            runner,
            out_dir,
            timeout,
        }
    }
}

impl CatalogUnit for DiagnosticsUnit<'_> {
    type Task = CompiledDiagnostic;
    type Output = DiagnosticResult;

    fn name<'t>(&self, task: &'t CompiledDiagnostic) -> &'t str {
        &task.task.name
    }

    #[instrument(skip_all, fields(task = %diag.task.name))]
    fn run(&self, diag: &CompiledDiagnostic) -> DiagnosticResult {
        let outcome = self.runner.run(&diag.task.command, self.timeout);

        let name = diag_artifact_name(&diag.task.filename, &ArtifactStamp::now());
        persist_artifact(self.out_dir, &name, &outcome.raw_output);

        let extracted_facts = diag.patterns.extract(&outcome.raw_output);
        debug!(
            status = %outcome.status,
            facts = extracted_facts.lines().count(),
            "diagnostic collected"
        );

        DiagnosticResult {
            command: outcome.executed_command,
            extracted_facts,
            status: outcome.status,
        }
    }

    fn failed(&self, diag: &CompiledDiagnostic, _reason: &str) -> DiagnosticResult {
        DiagnosticResult {
            command: diag.task.command.clone(),
            extracted_facts: String::new(),
            status: OutcomeStatus::Error,
        }
    }
}
