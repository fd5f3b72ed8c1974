// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based config extraction across the XDG hierarchy.
//!
//! Files are consulted lowest-precedence first: `/etc/switchboard/` then
//! `~/.config/switchboard/` then `./switchboard.toml`, with `SWITCHBOARD_*`
//! environment variables overriding everything.

#![allow(clippy::result_large_err)] // figment::Error is large but the loader API keeps it unboxed

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SwitchboardConfig;

/// Extract configuration from the full file-plus-environment stack.
///
/// Layers, weakest to strongest:
/// 1. Compiled defaults
/// 2. `/etc/switchboard/switchboard.toml` (system-wide)
/// 3. `~/.config/switchboard/switchboard.toml` (user XDG config)
/// 4. `./switchboard.toml` (local directory)
/// 5. `SWITCHBOARD_*` environment variables
pub fn load_config() -> Result<SwitchboardConfig, figment::Error> {
    build_figment().extract()
}

/// Extract configuration from a TOML string over the compiled defaults.
///
/// No file lookup and no environment; tests and embedded configs use this.
pub fn load_config_from_str(toml_content: &str) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Extract configuration from one explicit file, still honoring env overrides.
pub fn load_config_from_path(path: &Path) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Assemble the layered [`Figment`] without extracting.
///
/// Split out so callers that want provenance metadata (which file set a key)
/// can inspect the figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file("/etc/switchboard/switchboard.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("switchboard/switchboard.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("switchboard.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// `Env::split("_")` would be wrong here: key names themselves contain
/// underscores, and `SWITCHBOARD_SERVER_BIND_ADDRESS` has to become
/// `server.bind_address`, never `server.bind.address`. Each section prefix
/// is therefore rewritten explicitly.
fn env_provider() -> Env {
    Env::prefixed("SWITCHBOARD_").map(|key| {
        // Arrives lowercased with the prefix already stripped, e.g.
        // SWITCHBOARD_SERVER_BIND_ADDRESS -> "server_bind_address".
        key.as_str()
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("engine_", "engine.", 1)
            .replacen("campaign_", "campaign.", 1)
            .into()
    })
}
