// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that run after deserialization.
//!
//! Serde attributes can reject unknown keys and wrong types, but not a port
//! of 0, a queue declared twice, or an `engine.default_queue` that names no
//! entry in the `[[queues]]` array. Those rules live here.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Run every semantic check against a parsed configuration.
///
/// Collects all failures rather than stopping at the first, so one
/// `switchboard config validate` round trip shows the whole picture.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.bind_address must not be empty".to_string(),
        });
    }

    // Anything non-empty still has to look like an IP or hostname
    if !config.server.bind_address.trim().is_empty() {
        let addr = config.server.bind_address.trim();
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "server.bind_address `{addr}` is not a valid IP address or hostname"
                ),
            });
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must not be 0".to_string(),
        });
    }

    if !VALID_LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "server.log_level `{}` is not one of: {}",
                config.server.log_level,
                VALID_LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.engine.heartbeat_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.heartbeat_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.engine.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.sweep_interval_secs must be at least 1".to_string(),
        });
    }

    if config.campaign.max_rate_per_second == 0 {
        errors.push(ConfigError::Validation {
            message: "campaign.max_rate_per_second must be at least 1".to_string(),
        });
    }

    // Validate no duplicate queue ids
    let mut seen_ids = HashSet::new();
    for queue in &config.queues {
        if !seen_ids.insert(&queue.id) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate queue id `{}` in [[queues]] array", queue.id),
            });
        }
    }

    // Validate queue ids are non-empty and slots are at least 1
    for (i, queue) in config.queues.iter().enumerate() {
        if queue.id.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("queues[{i}].id must not be empty"),
            });
        }
        if queue.max_concurrent_slots == 0 {
            errors.push(ConfigError::Validation {
                message: format!(
                    "queues[{i}].max_concurrent_slots must be at least 1, got 0"
                ),
            });
        }
        let mut seen_agents = HashSet::new();
        for agent in &queue.agents {
            if !seen_agents.insert(agent) {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "duplicate agent id `{agent}` in queue `{}`",
                        queue.id
                    ),
                });
            }
        }
    }

    // Validate default_queue references a configured queue
    if let Some(default_queue) = &config.engine.default_queue
        && !config.queues.is_empty()
        && config.queue(default_queue).is_none()
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "engine.default_queue `{default_queue}` does not match any [[queues]] id"
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
