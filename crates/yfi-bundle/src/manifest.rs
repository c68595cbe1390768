//! Bundle manifest types and serialization.
//!
//! The manifest is the source of truth for an archive's contents:
//! - run metadata (run id, report folder name, tool version)
//! - one entry per file with its SHA-256 and size

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current bundle schema version.
pub const BUNDLE_SCHEMA_VERSION: &str = "1.0.0";

/// Manifest file name within the bundle.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Bundle manifest containing run metadata and file checksums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Bundle format version.
    pub bundle_version: String,

    /// When the archive was written.
    pub created_at: DateTime<Utc>,

    /// Run that produced the report folder.
    pub run_id: String,

    /// Report folder name, e.g. `alice_wifi_diag_260115_143022`.
    pub diag_name: String,

    /// Files included in the bundle with checksums.
    pub files: Vec<FileEntry>,

    /// Host description, e.g. `linux/wlan0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
}

impl BundleManifest {
    pub fn new(run_id: impl Into<String>, diag_name: impl Into<String>) -> Self {
        Self {
            bundle_version: BUNDLE_SCHEMA_VERSION.to_string(),
            created_at: Utc::now(),
            run_id: run_id.into(),
            diag_name: diag_name.into(),
            files: Vec::new(),
            host: None,
            tool_version: None,
        }
    }

    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = Some(version.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn add_file(&mut self, entry: FileEntry) {
        self.files.push(entry);
    }

    /// Total size of all files in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn find_file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Validate the manifest structure.
    pub fn validate(&self) -> crate::Result<()> {
        if self.bundle_version != BUNDLE_SCHEMA_VERSION {
            return Err(crate::BundleError::UnsupportedVersion {
                version: self.bundle_version.clone(),
                supported: BUNDLE_SCHEMA_VERSION.to_string(),
            });
        }

        if self.run_id.is_empty() {
            return Err(crate::BundleError::CorruptedManifest(
                "run_id is empty".to_string(),
            ));
        }

        for file in &self.files {
            if file.path.is_empty() || file.path == MANIFEST_FILE_NAME {
                return Err(crate::BundleError::CorruptedManifest(format!(
                    "invalid file entry path '{}'",
                    file.path
                )));
            }
            if file.sha256.len() != 64 {
                return Err(crate::BundleError::CorruptedManifest(format!(
                    "file '{}' has invalid checksum length",
                    file.path
                )));
            }
        }

        Ok(())
    }

    /// Sort files for deterministic ordering.
    pub fn sort_files(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// File entry in the manifest with checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path within the bundle (relative).
    pub path: String,

    /// SHA-256 checksum (64 hex characters).
    pub sha256: String,

    pub bytes: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, sha256: impl Into<String>, bytes: u64) -> Self {
        Self {
            path: path.into(),
            sha256: sha256.into(),
            bytes,
        }
    }

    /// Entry for `data` stored at `path`.
    pub fn for_data(path: impl Into<String>, data: &[u8]) -> Self {
        Self::new(path, Self::compute_checksum(data), data.len() as u64)
    }

    pub fn compute_checksum(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute_checksum(data) == self.sha256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_new() {
        let manifest = BundleManifest::new("run-0123456789ab", "alice_wifi_diag_260115_143022")
            .with_tool_version("1.5.0")
            .with_host("darwin/en0");

        assert_eq!(manifest.host.as_deref(), Some("darwin/en0"));
        assert_eq!(manifest.run_id, "run-0123456789ab");
        assert_eq!(manifest.diag_name, "alice_wifi_diag_260115_143022");
        assert_eq!(manifest.bundle_version, BUNDLE_SCHEMA_VERSION);
        assert_eq!(manifest.tool_version.as_deref(), Some("1.5.0"));
    }

    #[test]
    fn test_manifest_totals_and_lookup() {
        let mut manifest = BundleManifest::new("run-1", "diag");
        manifest.add_file(FileEntry::for_data("b.txt", b"world!"));
        manifest.add_file(FileEntry::for_data("a.txt", b"hello"));
        manifest.sort_files();

        assert_eq!(manifest.file_count(), 2);
        assert_eq!(manifest.total_bytes(), 11);
        assert_eq!(manifest.files[0].path, "a.txt");
        assert!(manifest.find_file("b.txt").is_some());
        assert!(manifest.find_file("c.txt").is_none());
    }

    #[test]
    fn test_checksum_known_value() {
        assert_eq!(
            FileEntry::compute_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let entry = FileEntry::for_data("x", b"abc");
        assert!(entry.verify(b"abc"));
        assert!(!entry.verify(b"abd"));
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let mut manifest = BundleManifest::new("run-1", "diag");
        assert!(manifest.validate().is_ok());

        manifest.add_file(FileEntry::new("a.txt", "deadbeef", 1));
        assert!(matches!(
            manifest.validate(),
            Err(crate::BundleError::CorruptedManifest(_))
        ));

        let mut manifest = BundleManifest::new("", "diag");
        manifest.bundle_version = BUNDLE_SCHEMA_VERSION.to_string();
        assert!(manifest.validate().is_err());

        let mut manifest = BundleManifest::new("run-1", "diag");
        manifest.bundle_version = "9.9.9".to_string();
        assert!(matches!(
            manifest.validate(),
            Err(crate::BundleError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let mut manifest = BundleManifest::new("run-1", "diag");
        manifest.add_file(FileEntry::for_data("a.txt", b"hello"));
        let parsed = BundleManifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed.files, manifest.files);
        assert_eq!(parsed.created_at, manifest.created_at);
        assert!(parsed.tool_version.is_none());
    }
}
