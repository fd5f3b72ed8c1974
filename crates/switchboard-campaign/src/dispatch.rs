// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-campaign dispatch loop.
//!
//! One task per running campaign walks the recipient snapshot in position
//! order, paced by a tick interval derived from the campaign's rate cap.
//! Every send lands through the ordinary engine append path, so campaign
//! messages show up in history and on the push hub exactly like manual
//! ones. The recipient status and the campaign cursor are persisted
//! together after each send; cancellation is only observed between sends,
//! which is what makes the persisted cursor a clean resume point.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use switchboard_core::{Campaign, CampaignRecipient, CampaignStatus, DeliveryStatus, NewMessage, SenderKind};
use switchboard_engine::ConversationEngine;
use switchboard_metrics as metrics;
use switchboard_store::SqliteStore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::RunnerHandle;

/// Walk the snapshot from the campaign's cursor until it is exhausted,
/// the token fires, or the store goes away.
pub(crate) async fn run_dispatch(
    store: Arc<SqliteStore>,
    engine: Arc<ConversationEngine>,
    runners: Arc<DashMap<String, RunnerHandle>>,
    campaign: Campaign,
    rate_per_second: u32,
    token: CancellationToken,
) {
    let period = Duration::from_secs_f64(1.0 / f64::from(rate_per_second));
    let mut interval = tokio::time::interval(period);
    // A stall (slow adapter, paused runtime) must not be followed by a
    // burst that breaks the rate cap.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cursor = campaign.cursor;
    info!(
        campaign_id = %campaign.id,
        cursor,
        rate_per_second,
        "campaign dispatch started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = token.cancelled() => {
                info!(campaign_id = %campaign.id, cursor, "campaign dispatch stopped");
                break;
            }
        }

        let recipient = match store.next_pending_recipient(&campaign.id, cursor).await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => {
                finish_campaign(&store, &campaign.id).await;
                break;
            }
            Err(e) => {
                warn!(campaign_id = %campaign.id, error = %e, "campaign dispatch halted");
                break;
            }
        };

        let position = recipient.position;
        let (status, conversation_id) = send_to_recipient(&engine, &campaign, &recipient).await;
        cursor = position;
        if let Err(e) = store
            .record_send(&campaign.id, position, status, conversation_id.as_deref())
            .await
        {
            warn!(
                campaign_id = %campaign.id,
                position,
                error = %e,
                "could not record campaign send; dispatch halted"
            );
            break;
        }
        metrics::record_campaign_send(&status.to_string());
        debug!(campaign_id = %campaign.id, position, status = %status, "campaign send recorded");
    }

    runners.remove(&campaign.id);
}

/// Resolve the recipient's conversation and push the templated message
/// through the engine. Any failure is that recipient's failure alone.
async fn send_to_recipient(
    engine: &ConversationEngine,
    campaign: &Campaign,
    recipient: &CampaignRecipient,
) -> (DeliveryStatus, Option<String>) {
    let conversation = match engine
        .ensure_conversation(campaign.channel, &recipient.address, None)
        .await
    {
        Ok(conversation) => conversation,
        Err(e) => {
            warn!(
                campaign_id = %campaign.id,
                position = recipient.position,
                error = %e,
                "could not resolve recipient conversation"
            );
            return (DeliveryStatus::Failed, None);
        }
    };

    let message = NewMessage {
        sender_kind: SenderKind::Bot,
        sender_id: Some(campaign.id.clone()),
        content: campaign.template.clone(),
        delivery_status: Some(DeliveryStatus::Pending),
    };
    match engine.ingest_message(&conversation.id, message).await {
        Ok(outcome) => {
            let status = match outcome.message.delivery_status {
                Some(DeliveryStatus::Sent) => DeliveryStatus::Sent,
                _ => DeliveryStatus::Failed,
            };
            (status, Some(conversation.id))
        }
        Err(e) => {
            warn!(
                campaign_id = %campaign.id,
                position = recipient.position,
                error = %e,
                "campaign append failed"
            );
            (DeliveryStatus::Failed, Some(conversation.id))
        }
    }
}

async fn finish_campaign(store: &SqliteStore, campaign_id: &str) {
    match store
        .set_campaign_status_if(campaign_id, CampaignStatus::Running, CampaignStatus::Finished)
        .await
    {
        Ok(true) => info!(campaign_id, "campaign finished"),
        Ok(false) => {
            // Paused concurrently; the pause wins and keeps the cursor.
            debug!(campaign_id, "campaign no longer running; not marking finished");
        }
        Err(e) => warn!(campaign_id, error = %e, "could not mark campaign finished"),
    }
}
