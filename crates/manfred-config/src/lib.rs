// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for Manfred.
//!
//! TOML files in a fixed hierarchy, `MANFRED_*` environment overrides,
//! strict key checking, and miette diagnostics with typo suggestions.
//!
//! ```no_run
//! let config = manfred_config::load_and_validate().expect("config errors");
//! println!("database: {}", config.database_path().display());
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{AgentConfig, LoggingConfig, ManfredConfig, StorageConfig};

/// Loads the standard hierarchy and validates the result.
pub fn load_and_validate() -> Result<ManfredConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Loads one explicit file (plus environment) and validates the result.
pub fn load_and_validate_path(path: &Path) -> Result<ManfredConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Loads a TOML string over the defaults and validates the result.
pub fn load_and_validate_str(toml_content: &str) -> Result<ManfredConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Serializes the effective configuration back to TOML.
pub fn to_toml(config: &ManfredConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::Other(e.to_string()))
}

fn finish(
    loaded: Result<ManfredConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<ManfredConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            tracing::debug!(database = %config.database_path().display(), "configuration loaded");
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// File contents for span resolution, in the same order the loader reads them.
fn collect_toml_sources() -> Vec<(String, String)> {
    let candidates = [
        Some(Path::new(loader::SYSTEM_CONFIG_PATH).to_path_buf()),
        loader::user_config_path(),
        std::env::current_dir()
            .ok()
            .map(|d| d.join(loader::LOCAL_CONFIG_PATH)),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
