//! Probe collection: command execution, fact extraction, and the catalog pool.
//!
//! - [`process_runner`]: one external command, timeout, classified outcome
//! - [`extract`]: pattern-based fact extraction
//! - [`pool`]: bounded-concurrency catalog execution
//! - [`diagnostics`] / [`probes`]: the two catalog units

pub mod diagnostics;
pub mod extract;
pub mod pool;
pub mod probes;
pub mod process_runner;

pub use diagnostics::{compile_diagnostics, CompiledDiagnostic, DiagnosticResult, DiagnosticsUnit};
pub use extract::PatternSet;
pub use pool::{CatalogResults, CatalogUnit, PoolError, TaskPool, DEFAULT_MAX_PARALLEL};
pub use probes::{SubTaskResult, TestResult, TestsUnit};
pub use process_runner::{
    BackgroundProcess, CommandRunner, ExecutionOutcome, OutcomeStatus, ProcessError,
    ProcessRunner,
};

use std::fs;
use std::path::Path;
use tracing::warn;
use yfi_common::ArtifactStamp;

/// Raw output file of one diagnostic: `2_diag_<filename>_<stamp>.txt`.
pub fn diag_artifact_name(filename: &str, stamp: &ArtifactStamp) -> String {
    format!("2_diag_{}_{}.txt", filename, stamp)
}

/// Raw output file of one test sub-task: `3_test_<filename>_<token>_<stamp>.txt`.
pub fn test_artifact_name(filename: &str, token: &str, stamp: &ArtifactStamp) -> String {
    format!("3_test_{}_{}_{}.txt", filename, token, stamp)
}

/// Write a unit artifact. A failed write is logged and otherwise ignored.
pub(crate) fn persist_artifact(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Err(e) = fs::write(&path, contents) {
        warn!(path = %path.display(), error = %e, "failed to write artifact");
    }
}
