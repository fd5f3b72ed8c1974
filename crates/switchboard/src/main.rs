// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - a realtime conversation engine with bot/human handoff.
//!
//! This is the binary entry point for the Switchboard server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config;
mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// Switchboard - a realtime conversation engine with bot/human handoff.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Switchboard server.
    Serve,
    /// Inspect Switchboard configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration inspection actions.
#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the config file lookup order and which files exist.
    ShowPath,
    /// Load configuration and report every validation error.
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = match switchboard_config::load_and_validate() {
                Ok(config) => config,
                Err(errors) => {
                    switchboard_config::render_errors(&errors);
                    std::process::exit(1);
                }
            };
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("switchboard serve failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => {
            config::run_config(action);
        }
        None => {
            println!("switchboard: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_the_global_allocator() {
        // Epoch advance is a jemalloc-only control; it errors under the
        // system allocator, so a passing read proves the swap took.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        assert!(stats::allocated::read().unwrap() > 0);
    }

    #[test]
    fn default_config_passes_validation() {
        // No config file in the test environment, so this exercises the
        // pure-defaults path end to end.
        let config =
            switchboard_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.server.port, 8787);
        assert!(config.server.auth_token.is_none());
    }
}
