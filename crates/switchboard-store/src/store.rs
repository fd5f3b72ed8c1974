// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed store facade.

use tokio::sync::OnceCell;
use tracing::debug;

use switchboard_config::model::StorageConfig;
use switchboard_core::{CampaignProgress, ConversationState, SwitchboardError};

use crate::database::Database;
use crate::models::{
    Campaign, CampaignRecipient, CampaignStatus, Conversation, DeliveryStatus, Message, NewMessage,
};
use crate::queries;

/// The persistence entry point the rest of the workspace talks to.
///
/// Thin facade over a [`Database`] handle: each method forwards into the
/// typed query modules. The connection opens on the first
/// [`initialize`](SqliteStore::initialize) call, not at construction.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create an unopened store; [`initialize`](SqliteStore::initialize)
    /// does the actual connect-and-migrate.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// The open database handle, or an error before `initialize` has run.
    fn db(&self) -> Result<&Database, SwitchboardError> {
        self.db.get().ok_or_else(|| {
            SwitchboardError::Internal(
                "store not initialized -- call initialize() first".to_string(),
            )
        })
    }

    /// Open the database at the configured path and run migrations.
    pub async fn initialize(&self) -> Result<(), SwitchboardError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| {
            SwitchboardError::Internal("store already initialized".to_string())
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Cheap liveness probe against the open connection.
    pub async fn health_check(&self) -> Result<(), SwitchboardError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(())
    }

    /// Checkpoint the WAL ahead of process shutdown.
    ///
    /// The connection itself stays open; dropping the store tears it down.
    pub async fn close(&self) -> Result<(), SwitchboardError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(crate::database::map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }

    // --- Conversation operations ---

    pub async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), SwitchboardError> {
        queries::conversations::create_conversation(self.db()?, conversation).await
    }

    pub async fn get_conversation(
        &self,
        id: &str,
    ) -> Result<Option<Conversation>, SwitchboardError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    pub async fn find_by_contact(
        &self,
        channel: &str,
        contact_address: &str,
    ) -> Result<Option<Conversation>, SwitchboardError> {
        queries::conversations::find_by_contact(self.db()?, channel, contact_address).await
    }

    pub async fn update_state(
        &self,
        id: &str,
        state: &ConversationState,
    ) -> Result<(), SwitchboardError> {
        queries::conversations::update_state(self.db()?, id, state).await
    }

    pub async fn set_queue(&self, id: &str, queue_id: Option<&str>) -> Result<(), SwitchboardError> {
        queries::conversations::set_queue(self.db()?, id, queue_id).await
    }

    pub async fn list_conversations(
        &self,
        state: Option<&str>,
    ) -> Result<Vec<Conversation>, SwitchboardError> {
        queries::conversations::list_conversations(self.db()?, state).await
    }

    pub async fn list_waiting(&self) -> Result<Vec<Conversation>, SwitchboardError> {
        queries::conversations::list_waiting(self.db()?).await
    }

    pub async fn list_assigned(&self) -> Result<Vec<Conversation>, SwitchboardError> {
        queries::conversations::list_assigned(self.db()?).await
    }

    pub async fn list_idle_open(&self, cutoff: &str) -> Result<Vec<Conversation>, SwitchboardError> {
        queries::conversations::list_idle_open(self.db()?, cutoff).await
    }

    // --- Message operations ---

    pub async fn append_message(
        &self,
        conversation_id: &str,
        new_message: NewMessage,
    ) -> Result<Message, SwitchboardError> {
        queries::messages::append_message(self.db()?, conversation_id, new_message).await
    }

    pub async fn append_transition(
        &self,
        conversation_id: &str,
        new_state: &ConversationState,
        audit: NewMessage,
    ) -> Result<Message, SwitchboardError> {
        queries::messages::append_transition(self.db()?, conversation_id, new_state, audit).await
    }

    pub async fn get_messages_since(
        &self,
        conversation_id: &str,
        since_seq: i64,
    ) -> Result<Vec<Message>, SwitchboardError> {
        queries::messages::get_messages_since(self.db()?, conversation_id, since_seq).await
    }

    pub async fn mark_delivery(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), SwitchboardError> {
        queries::messages::mark_delivery(self.db()?, message_id, status).await
    }

    // --- Campaign operations ---

    pub async fn create_campaign(
        &self,
        campaign: &Campaign,
        addresses: &[String],
    ) -> Result<(), SwitchboardError> {
        queries::campaigns::create_campaign(self.db()?, campaign, addresses).await
    }

    pub async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, SwitchboardError> {
        queries::campaigns::get_campaign(self.db()?, id).await
    }

    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>, SwitchboardError> {
        queries::campaigns::list_campaigns(self.db()?).await
    }

    pub async fn campaign_progress(&self, id: &str) -> Result<CampaignProgress, SwitchboardError> {
        queries::campaigns::campaign_progress(self.db()?, id).await
    }

    pub async fn set_campaign_status_if(
        &self,
        id: &str,
        expected: CampaignStatus,
        new_status: CampaignStatus,
    ) -> Result<bool, SwitchboardError> {
        queries::campaigns::set_status_if(self.db()?, id, expected, new_status).await
    }

    pub async fn record_send(
        &self,
        campaign_id: &str,
        position: i64,
        status: DeliveryStatus,
        conversation_id: Option<&str>,
    ) -> Result<(), SwitchboardError> {
        queries::campaigns::record_send(self.db()?, campaign_id, position, status, conversation_id)
            .await
    }

    pub async fn next_pending_recipient(
        &self,
        campaign_id: &str,
        after_position: i64,
    ) -> Result<Option<CampaignRecipient>, SwitchboardError> {
        queries::campaigns::next_pending_recipient(self.db()?, campaign_id, after_position).await
    }

    pub async fn get_recipient(
        &self,
        campaign_id: &str,
        position: i64,
    ) -> Result<Option<CampaignRecipient>, SwitchboardError> {
        queries::campaigns::get_recipient(self.db()?, campaign_id, position).await
    }

    pub async fn requeue_failed(&self, id: &str) -> Result<u64, SwitchboardError> {
        queries::campaigns::requeue_failed(self.db()?, id).await
    }

    pub async fn recover_running_campaigns(&self) -> Result<Vec<String>, SwitchboardError> {
        queries::campaigns::recover_running(self.db()?).await
    }
}
