// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::ManfredConfig;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
pub const LOG_FORMATS: [&str; 2] = ["text", "json"];

/// Validates a deserialized configuration.
///
/// Collects every violation rather than stopping at the first.
pub fn validate_config(config: &ManfredConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.data_dir.trim().is_empty() {
        fail("data_dir must not be empty".to_string());
    }

    if config
        .storage
        .database_path
        .as_deref()
        .is_some_and(|path| path.trim().is_empty())
    {
        fail("storage.database_path must not be empty when set".to_string());
    }

    if config.storage.busy_timeout_ms == 0 {
        fail("storage.busy_timeout_ms must be positive".to_string());
    }

    if config.storage.operation_timeout_secs == Some(0) {
        fail("storage.operation_timeout_secs must be positive when set".to_string());
    }

    let prefix = &config.agent.branch_prefix;
    if prefix.is_empty() {
        fail("agent.branch_prefix must not be empty".to_string());
    } else if prefix.contains('/') || prefix.chars().any(char::is_whitespace) {
        fail(format!(
            "agent.branch_prefix `{prefix}` must not contain `/` or whitespace"
        ));
    }

    let mention = &config.agent.mention;
    if !mention.starts_with('@') || mention.len() < 2 {
        fail(format!("agent.mention `{mention}` must start with `@`"));
    }

    if config.agent.marker_prefix.trim().is_empty() {
        fail("agent.marker_prefix must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        fail(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        fail(format!(
            "logging.format `{}` is not one of {}",
            config.logging.format,
            LOG_FORMATS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
