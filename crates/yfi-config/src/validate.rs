//! Configuration validation errors and semantic validation.
//!
//! Everything a run would otherwise discover halfway through collection is
//! rejected here: broken regexes, unknown probe tokens, duplicate names that
//! would collide in the report, and zero limits.

use crate::schema::{Config, FormattingStrategy, Profile, SubTask};
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

/// Adapter name used to instantiate `{adapter}` before compiling patterns.
const PROBE_ADAPTER: &str = "wlan0";

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid pattern in {field}: {message}")]
    InvalidPattern { field: String, message: String },

    #[error("Duplicate {kind} name '{name}' in {profile} profile")]
    DuplicateName {
        profile: String,
        kind: &'static str,
        name: String,
    },

    #[error("Unknown sub-task '{token}' in test {test}")]
    UnknownSubTask { test: String, token: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::ParseError(_) => 61,
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::InvalidPattern { .. } => 67,
            ValidationError::DuplicateName { .. } => 68,
            ValidationError::UnknownSubTask { .. } => 69,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate a whole configuration document.
pub fn validate_config(config: &Config) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.supported_systems.is_empty() {
        return Err(ValidationError::MissingField(
            "supported_systems".to_string(),
        ));
    }

    validate_profile("darwin", &config.darwin)?;
    validate_profile("linux", &config.linux)?;

    Ok(())
}

/// Validate one profile. Patterns are compiled after `{adapter}` substitution.
pub fn validate_profile(name: &str, profile: &Profile) -> ValidationResult<()> {
    let profile = profile.instantiate(PROBE_ADAPTER);
    let settings = &profile.settings;

    for (field, value) in [
        ("capture_window_secs", settings.capture_window_secs),
        (
            "capture_check_timeout_secs",
            settings.capture_check_timeout_secs,
        ),
        ("subprocess_timeout_secs", settings.subprocess_timeout_secs),
    ] {
        if value == 0 {
            return Err(ValidationError::InvalidValue {
                field: format!("{}.settings.{}", name, field),
                message: "Must be positive, got 0".to_string(),
            });
        }
    }

    if settings.max_parallel == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{}.settings.max_parallel", name),
            message: "Must be at least 1".to_string(),
        });
    }

    for (field, command) in [
        ("capture_command", &settings.capture_command),
        ("capture_check_command", &settings.capture_check_command),
        ("get_gateway_ipv4_command", &settings.get_gateway_ipv4_command),
        ("get_gateway_ipv6_command", &settings.get_gateway_ipv6_command),
        ("route_get_ipv4_command", &settings.route_get_ipv4_command),
        ("route_get_ipv6_command", &settings.route_get_ipv6_command),
        ("curl_ipv4_command", &settings.curl_ipv4_command),
        ("curl_ipv6_command", &settings.curl_ipv6_command),
    ] {
        if command.trim().is_empty() {
            return Err(ValidationError::MissingField(format!(
                "{}.settings.{}",
                name, field
            )));
        }
    }

    check_gateway_regex(
        &format!("{}.settings.gateway_ipv4_regex", name),
        &settings.gateway_ipv4_regex,
    )?;
    check_gateway_regex(
        &format!("{}.settings.gateway_ipv6_regex", name),
        &settings.gateway_ipv6_regex,
    )?;

    if profile.diagnostics.is_empty() {
        return Err(ValidationError::MissingField(format!(
            "{}.diagnostics",
            name
        )));
    }
    if profile.tests.is_empty() {
        return Err(ValidationError::MissingField(format!("{}.tests", name)));
    }

    let mut seen = HashSet::new();
    for diag in &profile.diagnostics {
        if !seen.insert(diag.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                profile: name.to_string(),
                kind: "diagnostic",
                name: diag.name.clone(),
            });
        }
        if diag.command.trim().is_empty() {
            return Err(ValidationError::MissingField(format!(
                "{}.diagnostics.{}.command",
                name, diag.name
            )));
        }
        check_filename(
            &format!("{}.diagnostics.{}.filename", name, diag.name),
            &diag.filename,
        )?;
        for (i, expr) in diag.expressions.iter().enumerate() {
            check_regex(
                &format!("{}.diagnostics.{}.expressions[{}]", name, diag.name, i),
                expr,
            )?;
        }
    }

    let mut seen = HashSet::new();
    for test in &profile.tests {
        if !seen.insert(test.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                profile: name.to_string(),
                kind: "test",
                name: test.name.clone(),
            });
        }
        if test.target.trim().is_empty() {
            return Err(ValidationError::MissingField(format!(
                "{}.tests.{}.target",
                name, test.name
            )));
        }
        check_filename(
            &format!("{}.tests.{}.filename", name, test.name),
            &test.filename,
        )?;
        if test.tokens().next().is_none() {
            return Err(ValidationError::MissingField(format!(
                "{}.tests.{}.tasks",
                name, test.name
            )));
        }
        for token in test.tokens() {
            if SubTask::parse(token).is_none() {
                return Err(ValidationError::UnknownSubTask {
                    test: test.name.clone(),
                    token: token.to_string(),
                });
            }
        }
    }

    let mut seen = HashSet::new();
    for rule in &profile.highlights {
        if !seen.insert(rule.id.as_str()) {
            return Err(ValidationError::DuplicateName {
                profile: name.to_string(),
                kind: "highlight",
                name: rule.id.clone(),
            });
        }
        check_regex(
            &format!("{}.highlights.{}.pattern", name, rule.id),
            &rule.pattern,
        )?;
        if let FormattingStrategy::Regroup {
            width, max_groups, ..
        } = &rule.strategy
        {
            if *width == 0 || *max_groups == 0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("{}.highlights.{}.strategy", name, rule.id),
                    message: format!(
                        "Regroup width and max_groups must be positive, got {} and {}",
                        width, max_groups
                    ),
                });
            }
        }
    }

    Ok(())
}

fn check_regex(field: &str, pattern: &str) -> ValidationResult<Regex> {
    Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn check_gateway_regex(field: &str, pattern: &str) -> ValidationResult<()> {
    let re = check_regex(field, pattern)?;
    if re.captures_len() < 2 {
        return Err(ValidationError::InvalidPattern {
            field: field.to_string(),
            message: "Must contain a capture group for the gateway address".to_string(),
        });
    }
    Ok(())
}

/// File name fragments end up inside artifact names.
fn check_filename(field: &str, filename: &str) -> ValidationResult<()> {
    if filename.is_empty() {
        return Err(ValidationError::MissingField(field.to_string()));
    }
    if filename.contains('/') || filename.contains('\0') {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must not contain path separators, got {:?}", filename),
        });
    }
    Ok(())
}
