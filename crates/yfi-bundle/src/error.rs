//! Error types for bundle operations.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("unsupported bundle version: {version} (supported: {supported})")]
    UnsupportedVersion { version: String, supported: String },

    #[error("corrupted manifest: {0}")]
    CorruptedManifest(String),

    #[error("file not found in bundle: {0}")]
    FileNotFound(String),

    /// Folder entries must be plain UTF-8 file names.
    #[error("cannot archive {0}: not a UTF-8 file name")]
    InvalidFileName(PathBuf),

    #[error("bundle has no content to write")]
    EmptyBundle,
}

pub type Result<T> = std::result::Result<T, BundleError>;
