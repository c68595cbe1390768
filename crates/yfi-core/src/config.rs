//! Configuration loading and profile selection for yfi-core.
//!
//! This module handles:
//! - Loading `config.json` through the standard resolution order
//! - Parse and semantic validation
//! - Selecting and instantiating the profile for the host OS
//! - Config snapshots for the JSON report

pub use yfi_config::{
    builtin_config, get_preset, list_presets, Config, ConfigPaths, ConfigSnapshot, ConfigSource,
    PresetName, Profile, ValidationError,
};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use yfi_config::{resolve_config, validate_config};

use crate::logging::event_names;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("No profile for {os}")]
    NoProfile { os: String },
}

impl From<ConfigError> for yfi_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ValidationError(e) => yfi_common::Error::InvalidConfig(e.to_string()),
            ConfigError::ParseError { .. } => yfi_common::Error::SchemaValidation(err.to_string()),
            ConfigError::NoProfile { os } => yfi_common::Error::UnsupportedSystem { os },
            other => yfi_common::Error::Config(other.to_string()),
        }
    }
}

/// Loaded configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub paths: ConfigPaths,
    /// Raw file text, when loaded from a file.
    pub content: Option<String>,
}

/// A profile instantiated for the host's adapter.
#[derive(Debug, Clone)]
pub struct SelectedProfile {
    pub name: String,
    pub profile: Profile,
}

impl ResolvedConfig {
    pub fn is_builtin(&self) -> bool {
        self.paths.config.is_none()
    }

    /// Profile for `os_type` with `{adapter}` substituted.
    pub fn select_profile(&self, os_type: &str, adapter: &str) -> Result<SelectedProfile, ConfigError> {
        let profile = self
            .config
            .profile_for(os_type)
            .ok_or_else(|| ConfigError::NoProfile {
                os: os_type.to_string(),
            })?;
        debug!(os = os_type, adapter, "profile selected");
        Ok(SelectedProfile {
            name: os_type.to_string(),
            profile: profile.instantiate(adapter),
        })
    }

    pub fn snapshot(&self, selected: &SelectedProfile) -> ConfigSnapshot {
        ConfigSnapshot::new(
            &self.paths,
            self.content.as_deref(),
            &selected.name,
            &selected.profile,
        )
    }
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. `--config` (a missing file is an error)
/// 2. `YFI_CONFIG`, then `YFI_CONFIG_DIR/config.json`
/// 3. XDG config home (`~/.config/yfi/config.json`)
/// 4. Built-in presets
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    load_from_paths(resolve_config(cli_path))
}

/// Load from already-resolved paths.
pub fn load_from_paths(paths: ConfigPaths) -> Result<ResolvedConfig, ConfigError> {
    let (config, content) = match &paths.config {
        Some(path) => {
            let (config, content) = load_file(path)?;
            (config, Some(content))
        }
        None => {
            info!(
                event = event_names::CONFIG_DEFAULT_USED,
                "no external configuration provided, using built-in defaults"
            );
            (builtin_config(), None)
        }
    };

    validate_config(&config)?;

    info!(
        event = event_names::CONFIG_LOADED,
        source = %paths.source,
        path = ?paths.config,
        "configuration loaded"
    );
    Ok(ResolvedConfig {
        config,
        paths,
        content,
    })
}

fn load_file(path: &Path) -> Result<(Config, String), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&content).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((config, content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn paths_for(path: &Path) -> ConfigPaths {
        ConfigPaths {
            config: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        }
    }

    #[test]
    fn test_builtin_when_no_file() {
        let resolved = load_from_paths(ConfigPaths::default()).unwrap();
        assert!(resolved.is_builtin());
        assert!(resolved.content.is_none());
        assert!(resolved.config.is_supported("linux"));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(Some(&tmp.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(matches!(
            yfi_common::Error::from(err),
            yfi_common::Error::Config(_)
        ));
    }

    #[test]
    fn test_file_round_trip_and_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let text = serde_json::to_string_pretty(&builtin_config()).unwrap();
        fs::write(&path, &text).unwrap();

        let resolved = load_from_paths(paths_for(&path)).unwrap();
        assert_eq!(resolved.content.as_deref(), Some(text.as_str()));

        let selected = resolved.select_profile("linux", "wlp2s0").unwrap();
        assert!(selected.profile.settings.capture_check_command.contains("wlp2s0"));

        let snapshot = resolved.snapshot(&selected);
        assert_eq!(snapshot.profile, "linux");
        assert_eq!(snapshot.source, "CLI argument");
        assert_eq!(snapshot.content_hash.len(), 64);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_from_paths(paths_for(&path)),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let mut config = builtin_config();
        config.linux.tests[0].tasks = "ping nslookup".to_string();
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        assert!(matches!(
            load_from_paths(paths_for(&path)),
            Err(ConfigError::ValidationError(ValidationError::UnknownSubTask { .. }))
        ));
    }

    #[test]
    fn test_unknown_os_has_no_profile() {
        let resolved = load_from_paths(ConfigPaths::default()).unwrap();
        assert!(matches!(
            resolved.select_profile("freebsd", "em0"),
            Err(ConfigError::NoProfile { .. })
        ));
    }
}
