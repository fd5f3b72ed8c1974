// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard conversation engine.
//!
//! Every struct carries `#[serde(deny_unknown_fields)]`: a misspelled key
//! stops startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Assembled by the loader from XDG-hierarchy TOML files plus environment
/// overrides. Every section may be omitted; defaults produce a runnable
/// single-node setup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// HTTP/WS server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// State machine, queue, and sweep settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Campaign dispatcher settings.
    #[serde(default)]
    pub campaign: CampaignConfig,

    /// Agent queues, one `[[queues]]` table per queue.
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

impl SwitchboardConfig {
    /// Look up a queue by its config id.
    pub fn queue(&self, queue_id: &str) -> Option<&QueueConfig> {
        self.queues.iter().find(|q| q.id == queue_id)
    }
}

/// HTTP/WS server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the gateway to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to bind the gateway to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on `/v1` routes. `None` disables auth
    /// (local development only).
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Base log level: one of trace, debug, info, warn, error.
    /// `RUST_LOG` still overrides per-target filters at runtime.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            auth_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Where the SQLite file lives. Parent directories are created on open.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Run SQLite in write-ahead-log mode so readers don't block the writer.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("switchboard").join("switchboard.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("switchboard.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// State machine, queue, and sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Phrases that escalate a bot conversation to a human queue.
    /// Matched case-insensitively anywhere in the message body.
    #[serde(default = "default_escalation_keywords")]
    pub escalation_keywords: Vec<String>,

    /// Queue that escalated conversations land on when no queue is
    /// named explicitly. Must reference a `[[queues]]` id when queues
    /// are configured.
    #[serde(default)]
    pub default_queue: Option<String>,

    /// Seconds of websocket silence before a connection is pruned.
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,

    /// Interval between background sweep runs (starvation, idle close,
    /// connection pruning).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Waiting conversations older than this trigger a starvation
    /// warning. Advisory only; nothing is dropped.
    #[serde(default = "default_starvation_warn_secs")]
    pub starvation_warn_secs: u64,

    /// Open conversations idle longer than this are auto-closed.
    /// 0 disables the idle-close sweep.
    #[serde(default)]
    pub idle_close_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            escalation_keywords: default_escalation_keywords(),
            default_queue: None,
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            starvation_warn_secs: default_starvation_warn_secs(),
            idle_close_secs: 0,
        }
    }
}

fn default_escalation_keywords() -> Vec<String> {
    vec![
        "falar com atendente".to_string(),
        "atendimento humano".to_string(),
        "talk to a human".to_string(),
    ]
}

fn default_heartbeat_timeout_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_starvation_warn_secs() -> u64 {
    120
}

/// Campaign dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    /// Upper bound on any campaign's `rate_per_second`. Campaigns
    /// requesting more are clamped at launch.
    #[serde(default = "default_max_rate_per_second")]
    pub max_rate_per_second: u32,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            max_rate_per_second: default_max_rate_per_second(),
        }
    }
}

fn default_max_rate_per_second() -> u32 {
    30
}

/// One agent queue.
///
/// Queues are read-mostly configuration; live slot occupancy is tracked
/// by the engine's queue board, never written back here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Stable queue id referenced by conversations and routes.
    pub id: String,

    /// Human-readable name. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    /// Maximum conversations concurrently assigned across this queue's
    /// agents. Overflow waits in FIFO order.
    #[serde(default = "default_max_concurrent_slots")]
    pub max_concurrent_slots: u32,

    /// Agent ids in round-robin order. An empty list parks waiting
    /// conversations indefinitely.
    #[serde(default)]
    pub agents: Vec<String>,
}

impl QueueConfig {
    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

fn default_max_concurrent_slots() -> u32 {
    1
}
