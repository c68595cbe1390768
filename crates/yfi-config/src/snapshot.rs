//! Configuration snapshots for report reproducibility.
//!
//! A snapshot captures which configuration a run used, so two reports can be
//! compared knowing whether they ran the same catalogs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::ConfigPaths;
use crate::schema::Profile;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Source of the configuration (CLI argument, environment variable, ...).
    pub source: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// SHA-256 of the file content; for built-in presets, of their serialized form.
    pub content_hash: String,

    /// Profile selected for this host (`darwin`, `linux`).
    pub profile: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSummary {
    pub diagnostics: usize,
    pub tests: usize,
    pub highlights: usize,
    pub max_parallel: usize,
    pub subprocess_timeout_secs: u64,
    pub capture_window_secs: u64,
}

impl ConfigSnapshot {
    /// Create a new snapshot from the selected profile.
    ///
    /// `content` is the raw file text when a file was loaded.
    pub fn new(
        paths: &ConfigPaths,
        content: Option<&str>,
        profile_name: &str,
        profile: &Profile,
    ) -> Self {
        let content_hash = match content {
            Some(text) => hash_content(text),
            None => hash_content(&serde_json::to_string(profile).unwrap_or_default()),
        };

        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            source: paths.source.to_string(),
            path: paths.config.as_ref().map(|p| p.display().to_string()),
            content_hash,
            profile: profile_name.to_string(),
            summary: ConfigSummary::from_profile(profile),
        }
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this snapshot matches another (same config).
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.content_hash == other.content_hash && self.profile == other.profile
    }

    /// Get a short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.content_hash[..12.min(self.content_hash.len())]
    }
}

impl ConfigSummary {
    pub fn from_profile(profile: &Profile) -> Self {
        ConfigSummary {
            diagnostics: profile.diagnostics.len(),
            tests: profile.tests.len(),
            highlights: profile.highlights.len(),
            max_parallel: profile.settings.max_parallel,
            subprocess_timeout_secs: profile.settings.subprocess_timeout_secs,
            capture_window_secs: profile.settings.capture_window_secs,
        }
    }
}

/// Hash content with SHA-256 and return hex string.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{get_preset, PresetName};
    use crate::resolve::ConfigSource;

    fn builtin_snapshot(name: PresetName) -> ConfigSnapshot {
        ConfigSnapshot::new(
            &ConfigPaths::default(),
            None,
            name.as_str(),
            &get_preset(name),
        )
    }

    #[test]
    fn test_builtin_snapshot() {
        let snapshot = builtin_snapshot(PresetName::Linux);
        assert_eq!(snapshot.schema_version, crate::CONFIG_SCHEMA_VERSION);
        assert_eq!(snapshot.source, ConfigSource::BuiltinDefault.to_string());
        assert!(snapshot.path.is_none());
        assert_eq!(snapshot.summary.max_parallel, 5);
        assert_eq!(snapshot.summary.tests, 6);
    }

    #[test]
    fn test_snapshot_matches() {
        let s1 = builtin_snapshot(PresetName::Darwin);
        let s2 = builtin_snapshot(PresetName::Darwin);
        let s3 = builtin_snapshot(PresetName::Linux);
        assert!(s1.matches(&s2));
        assert!(!s1.matches(&s3));
        assert_eq!(s1.short_id().len(), 12);
    }

    #[test]
    fn test_file_snapshot_hashes_content() {
        let paths = ConfigPaths {
            config: Some("/tmp/yfi/config.json".into()),
            source: ConfigSource::CliArgument,
        };
        let profile = get_preset(PresetName::Linux);
        let snapshot = ConfigSnapshot::new(&paths, Some("{}"), "linux", &profile);
        assert_eq!(snapshot.content_hash, hash_content("{}"));
        assert_eq!(snapshot.path.as_deref(), Some("/tmp/yfi/config.json"));
        assert_eq!(snapshot.source, "CLI argument");
    }

    #[test]
    fn test_hash_content() {
        let hash1 = hash_content("test");
        assert_eq!(hash1, hash_content("test"));
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let snapshot = builtin_snapshot(PresetName::Linux);
        let json = snapshot.to_json().unwrap();
        let restored = ConfigSnapshot::from_json(&json).unwrap();
        assert!(snapshot.matches(&restored));
    }
}
