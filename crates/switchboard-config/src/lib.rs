// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Switchboard conversation engine.
//!
//! TOML files merged across the XDG hierarchy, `SWITCHBOARD_*` environment
//! overrides on top, strict schemas (`deny_unknown_fields`) underneath, and
//! miette diagnostics with typo suggestions when any of it goes wrong.
//!
//! # Usage
//!
//! ```no_run
//! use switchboard_config::load_and_validate;
//!
//! let config = load_and_validate().expect("invalid configuration");
//! println!("Binding to {}:{}", config.server.bind_address, config.server.port);
//! ```

use std::path::PathBuf;

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    CampaignConfig, EngineConfig, QueueConfig, ServerConfig, StorageConfig, SwitchboardConfig,
};

/// Load from the XDG hierarchy, then validate.
///
/// The one-call entry point for binaries: figment extraction over files plus
/// env vars, then the semantic checks in [`validation`]. Extraction failures
/// come back as rendered-ready diagnostics with spans into whichever TOML
/// file supplied the bad key.
pub fn load_and_validate() -> Result<SwitchboardConfig, Vec<ConfigError>> {
    let config = loader::load_config()
        .map_err(|err| diagnostic::figment_to_config_errors(err, &collect_toml_sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a TOML string and validate it.
///
/// Same pipeline as [`load_and_validate`] without touching the filesystem.
pub fn load_and_validate_str(toml_content: &str) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    let config = loader::load_config_from_str(toml_content).map_err(|err| {
        let sources = [("<inline>".to_string(), toml_content.to_string())];
        diagnostic::figment_to_config_errors(err, &sources)
    })?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Read every config file the loader consults, keyed by the path figment
/// records in its error metadata, so diagnostics can underline the source.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = Vec::new();

    // Figment resolves the local file against the working directory, so the
    // recorded path has to match that resolution or span lookup misses.
    candidates.push(match std::env::current_dir() {
        Ok(dir) => dir.join("switchboard.toml"),
        Err(_) => PathBuf::from("switchboard.toml"),
    });
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("switchboard/switchboard.toml"));
    }
    candidates.push(PathBuf::from("/etc/switchboard/switchboard.toml"));

    candidates
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
