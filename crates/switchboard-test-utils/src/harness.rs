// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process stack assembly for end-to-end tests.
//!
//! `TestHarness` stands up the whole conversation stack over a temp
//! SQLite database: store, hub, engine, campaign manager, and a
//! [`MockOutbound`] registered on every channel. Convenience drivers
//! (`contact_says`, `agent_says`) push messages through the same path
//! production traffic takes.

use std::sync::Arc;

use switchboard_campaign::CampaignManager;
use switchboard_config::model::{QueueConfig, SwitchboardConfig};
use switchboard_core::{ChannelKind, NewMessage, SwitchboardError};
use switchboard_engine::{ConversationEngine, IngestOutcome};
use switchboard_hub::PushHub;
use switchboard_store::SqliteStore;

use crate::mock_outbound::MockOutbound;

/// Configures the stack a test wants before it is built.
pub struct TestHarnessBuilder {
    queues: Vec<QueueConfig>,
    default_queue: Option<String>,
    escalation_keywords: Option<Vec<String>>,
    idle_close_secs: u64,
    max_rate_per_second: u32,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            queues: Vec::new(),
            default_queue: None,
            escalation_keywords: None,
            idle_close_secs: 0,
            max_rate_per_second: 1000,
        }
    }

    /// Add a queue with the given slot budget and agent roster.
    pub fn with_queue(mut self, id: &str, max_concurrent_slots: u32, agents: &[&str]) -> Self {
        self.queues.push(QueueConfig {
            id: id.to_string(),
            name: None,
            max_concurrent_slots,
            agents: agents.iter().map(|a| a.to_string()).collect(),
        });
        self
    }

    /// Queue escalated conversations land on by default.
    pub fn with_default_queue(mut self, queue_id: &str) -> Self {
        self.default_queue = Some(queue_id.to_string());
        self
    }

    /// Replace the stock escalation keyword list.
    pub fn with_escalation_keywords(mut self, keywords: &[&str]) -> Self {
        self.escalation_keywords = Some(keywords.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Enable the idle-close sweep with the given threshold.
    pub fn with_idle_close_secs(mut self, secs: u64) -> Self {
        self.idle_close_secs = secs;
        self
    }

    /// Cap campaign send rates (the server-side clamp).
    pub fn with_campaign_rate_cap(mut self, max_rate_per_second: u32) -> Self {
        self.max_rate_per_second = max_rate_per_second;
        self
    }

    /// Stand up every subsystem and wire them together.
    pub async fn build(self) -> Result<TestHarness, SwitchboardError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| SwitchboardError::Store { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = SwitchboardConfig::default();
        config.storage.database_path = db_path.to_string_lossy().into_owned();
        config.queues = self.queues;
        config.engine.default_queue = self.default_queue;
        config.engine.idle_close_secs = self.idle_close_secs;
        if let Some(keywords) = self.escalation_keywords {
            config.engine.escalation_keywords = keywords;
        }
        config.campaign.max_rate_per_second = self.max_rate_per_second;

        let store = Arc::new(SqliteStore::new(config.storage.clone()));
        store.initialize().await?;

        let hub = Arc::new(PushHub::new());
        let engine = Arc::new(ConversationEngine::new(store.clone(), hub.clone(), &config));

        let outbound = Arc::new(MockOutbound::new());
        for channel in [ChannelKind::Web, ChannelKind::Whatsapp, ChannelKind::Sms] {
            engine.register_outbound(channel, outbound.clone());
        }

        let campaigns = Arc::new(CampaignManager::new(store.clone(), engine.clone(), &config));

        Ok(TestHarness {
            config,
            store,
            hub,
            engine,
            campaigns,
            outbound,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment over a temp database.
pub struct TestHarness {
    /// The effective configuration the stack was built from.
    pub config: SwitchboardConfig,
    /// Message store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    /// Push hub; subscribe directly to observe fan-out.
    pub hub: Arc<PushHub>,
    /// The conversation engine.
    pub engine: Arc<ConversationEngine>,
    /// Campaign lifecycle manager.
    pub campaigns: Arc<CampaignManager>,
    /// Capturing outbound adapter, registered on every channel.
    pub outbound: Arc<MockOutbound>,
    /// Held so the temp database outlives the harness and not longer.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Start describing a harness; finish with [`build`](TestHarnessBuilder::build).
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Drive one inbound contact message end to end, creating the
    /// conversation on first use.
    pub async fn contact_says(
        &self,
        channel: ChannelKind,
        contact_address: &str,
        text: &str,
    ) -> Result<IngestOutcome, SwitchboardError> {
        let conversation = self
            .engine
            .ensure_conversation(channel, contact_address, None)
            .await?;
        self.engine
            .ingest_message(&conversation.id, NewMessage::contact(text))
            .await
    }

    /// Append an agent message, delivered outbound through the mock.
    pub async fn agent_says(
        &self,
        conversation_id: &str,
        agent_id: &str,
        text: &str,
    ) -> Result<IngestOutcome, SwitchboardError> {
        self.engine
            .ingest_message(conversation_id, NewMessage::agent(agent_id, text))
            .await
    }
}
