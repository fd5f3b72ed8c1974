// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard config` command implementation.
//!
//! Inspection helpers for the layered configuration: where files are
//! looked up, and whether the merged result validates.

use std::path::{Path, PathBuf};

use crate::ConfigAction;

/// Run the `switchboard config` command.
pub fn run_config(action: ConfigAction) {
    match action {
        ConfigAction::ShowPath => show_path(),
        ConfigAction::Validate => validate(),
    }
}

/// Print the config lookup order with existence markers.
fn show_path() {
    let xdg = dirs::config_dir().map(|d| d.join("switchboard/switchboard.toml"));
    let local = std::env::current_dir()
        .map(|d| d.join("switchboard.toml"))
        .unwrap_or_else(|_| PathBuf::from("switchboard.toml"));

    println!("Config files are merged in this order (later overrides earlier):");
    println!();
    print_entry(1, Path::new("/etc/switchboard/switchboard.toml"));
    if let Some(ref xdg) = xdg {
        print_entry(2, xdg);
    }
    print_entry(3, &local);
    println!();
    println!("Environment variables with the SWITCHBOARD_ prefix override file values.");
}

fn print_entry(order: usize, path: &Path) {
    let marker = if path.exists() { "found" } else { "not found" };
    println!("  {order}. {} ({marker})", path.display());
}

/// Load the merged configuration and report the result.
///
/// Validation failures render as diagnostics and exit non-zero so this
/// works as a deploy-time preflight check.
fn validate() {
    match switchboard_config::load_and_validate() {
        Ok(config) => {
            println!("configuration OK");
            println!(
                "  server:   {}:{}",
                config.server.bind_address, config.server.port
            );
            println!("  database: {}", config.storage.database_path);
            println!("  queues:   {}", config.queues.len());
            println!(
                "  auth:     {}",
                if config.server.auth_token.is_some() {
                    "bearer token"
                } else {
                    "disabled"
                }
            );
        }
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}
