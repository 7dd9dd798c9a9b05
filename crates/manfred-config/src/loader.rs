// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/manfred/manfred.toml`,
//! `~/.config/manfred/manfred.toml`, `./manfred.toml`, then `MANFRED_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ManfredConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/manfred/manfred.toml";
pub const LOCAL_CONFIG_PATH: &str = "manfred.toml";

/// Sections whose keys may be set from the environment. Top-level keys
/// (`MANFRED_DATA_DIR`) need no mapping.
const ENV_SECTIONS: [&str; 3] = ["storage", "agent", "logging"];

/// `~/.config/manfred/manfred.toml`, when the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("manfred").join("manfred.toml"))
}

/// The full file hierarchy plus environment overrides.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ManfredConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

pub fn load_config() -> Result<ManfredConfig, figment::Error> {
    build_figment().extract()
}

/// Loads one explicit file in place of the hierarchy. Environment overrides
/// still apply. A missing file is an error here, unlike in the hierarchy.
pub fn load_config_from_path(path: &Path) -> Result<ManfredConfig, figment::Error> {
    if !path.is_file() {
        return Err(figment::Error::from(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    Figment::new()
        .merge(Serialized::defaults(ManfredConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Defaults plus one TOML string. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<ManfredConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ManfredConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// `MANFRED_<SECTION>_<KEY>` maps to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `MANFRED_STORAGE_BUSY_TIMEOUT_MS` lands on `storage.busy_timeout_ms`.
fn env_provider() -> Env {
    Env::prefixed("MANFRED_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
