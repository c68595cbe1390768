//! yfi configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the collector configuration (`config.json`)
//! - Built-in darwin and linux presets
//! - Config resolution (CLI → env → XDG → built-in)
//! - Schema and semantic validation
//! - Config snapshots recorded in the JSON report

pub mod preset;
pub mod resolve;
pub mod schema;
pub mod snapshot;
pub mod validate;

pub use preset::{builtin_config, get_preset, list_presets, PresetInfo, PresetName};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use schema::{
    Config, DiagnosticTask, FormattingStrategy, HighlightRule, Profile, Settings, SubTask,
    TestTask, ADAPTER_PLACEHOLDER, GATEWAY_PLACEHOLDER,
};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, validate_profile, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
