// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model.
//!
//! Every struct rejects unknown keys so typos surface at startup instead of
//! being silently ignored.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Manfred configuration.
///
/// Built once at startup and handed to the store and orchestrator
/// constructors. All sections are optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ManfredConfig {
    /// Directory for local state. The database lives here unless
    /// `storage.database_path` says otherwise.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ManfredConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage: StorageConfig::default(),
            agent: AgentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ManfredConfig {
    /// Effective database location: the explicit path if set, otherwise
    /// `manfred.db` inside `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        match &self.storage.database_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.data_dir).join("manfred.db"),
        }
    }
}

fn default_data_dir() -> String {
    dirs::home_dir()
        .map(|p| p.join(".manfred"))
        .unwrap_or_else(|| PathBuf::from(".manfred"))
        .to_string_lossy()
        .into_owned()
}

/// Session store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default)]
    pub database_path: Option<String>,

    /// Enable write-ahead logging.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a statement waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Upper bound on a single store operation. Unset means no bound.
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
            operation_timeout_secs: None,
        }
    }
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// How the agent identifies itself on the tracker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// First path segment of working branches (`<prefix>/issue-N`).
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Mention that addresses the agent in comments.
    #[serde(default = "default_mention")]
    pub mention: String,

    /// Namespace of the hidden marker embedded in posted comments.
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            branch_prefix: default_branch_prefix(),
            mention: default_mention(),
            marker_prefix: default_marker_prefix(),
        }
    }
}

fn default_branch_prefix() -> String {
    "claude".to_string()
}

fn default_mention() -> String {
    "@claude".to_string()
}

fn default_marker_prefix() -> String {
    "manfred".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_defaults_into_data_dir() {
        let config = ManfredConfig {
            data_dir: "/var/lib/manfred".into(),
            ..ManfredConfig::default()
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/manfred/manfred.db")
        );
    }

    #[test]
    fn explicit_database_path_wins() {
        let mut config = ManfredConfig::default();
        config.storage.database_path = Some("/tmp/other.db".into());
        assert_eq!(config.database_path(), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn data_dir_ends_in_dot_manfred() {
        assert!(ManfredConfig::default().data_dir.ends_with(".manfred"));
    }
}
