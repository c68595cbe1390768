//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG path → built-in presets.

use std::path::{Path, PathBuf};

/// Discovered configuration file path.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to config.json (or None when the built-in presets apply).
    pub config: Option<PathBuf>,

    /// Where the path came from (for diagnostics).
    pub source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in presets.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "YFI_CONFIG";
pub const ENV_CONFIG_DIR: &str = "YFI_CONFIG_DIR";

/// Standard config file name.
const CONFIG_FILENAME: &str = "config.json";

/// Application name for XDG directories.
const APP_NAME: &str = "yfi";

/// Resolve the configuration path using the standard resolution order.
///
/// 1. Explicit CLI path (returned even if missing, so loading reports it)
/// 2. `YFI_CONFIG` (direct path)
/// 3. `YFI_CONFIG_DIR` + `config.json`
/// 4. XDG config directory (`~/.config/yfi/config.json`)
/// 5. Built-in presets (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    if let Some(path) = cli_path {
        return ConfigPaths {
            config: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return ConfigPaths {
                config: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return ConfigPaths {
                config: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return ConfigPaths {
                config: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    ConfigPaths::default()
}

/// Get the XDG config directory for yfi.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}
