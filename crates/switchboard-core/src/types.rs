// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core domain types shared across the workspace.
//!
//! Everything here is plain data: the store persists these rows, the
//! engine mutates them, the gateway serializes them. Enum wire encodings
//! are lowercase strings on both the SQLite and JSON sides.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::state::ConversationState;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SenderKind {
    /// The end user on the other side of the channel.
    Contact,
    /// A human agent.
    Agent,
    /// The automated bot.
    Bot,
    /// Engine-generated audit entries (state transitions, assignments).
    System,
}

/// Transport a conversation arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelKind {
    Web,
    Whatsapp,
    Sms,
}

/// Delivery outcome for outbound messages and campaign sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Lifecycle of a broadcast campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Running,
    Paused,
    Finished,
}

/// Role a websocket connection authenticated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionRole {
    Contact,
    Agent,
}

/// One entry in a conversation's append-only message log.
///
/// `seq` is gapless and strictly increasing within a conversation,
/// starting at 1. It is allocated by the store in the same transaction
/// that inserts the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub seq: i64,
    pub sender_kind: SenderKind,
    /// Agent id for agent messages, campaign id for campaign sends.
    pub sender_id: Option<String>,
    pub content: String,
    /// Only tracked for outbound sends; inbound rows carry `None`.
    pub delivery_status: Option<DeliveryStatus>,
    pub created_at: String,
}

/// Payload for appending a message; the store fills in id, seq and
/// timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_kind: SenderKind,
    pub sender_id: Option<String>,
    pub content: String,
    pub delivery_status: Option<DeliveryStatus>,
}

impl NewMessage {
    /// An inbound message from the contact.
    pub fn contact(content: impl Into<String>) -> Self {
        NewMessage {
            sender_kind: SenderKind::Contact,
            sender_id: None,
            content: content.into(),
            delivery_status: None,
        }
    }

    /// A message authored by the named agent.
    pub fn agent(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        NewMessage {
            sender_kind: SenderKind::Agent,
            sender_id: Some(agent_id.into()),
            content: content.into(),
            delivery_status: Some(DeliveryStatus::Pending),
        }
    }

    /// An automated bot reply.
    pub fn bot(content: impl Into<String>) -> Self {
        NewMessage {
            sender_kind: SenderKind::Bot,
            sender_id: None,
            content: content.into(),
            delivery_status: Some(DeliveryStatus::Pending),
        }
    }

    /// An engine-generated audit entry. Never delivered outbound.
    pub fn system(content: impl Into<String>) -> Self {
        NewMessage {
            sender_kind: SenderKind::System,
            sender_id: None,
            content: content.into(),
            delivery_status: None,
        }
    }
}

/// A conversation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub channel: ChannelKind,
    /// Channel-specific contact address (phone number, session token).
    pub contact_address: String,
    pub state: ConversationState,
    /// Queue the conversation was escalated onto. Survives close so a
    /// reopen lands back on the same queue.
    pub assigned_queue_id: Option<String>,
    /// Next seq the store will hand out; equals head seq + 1.
    pub next_seq: i64,
    pub last_activity_at: String,
    pub created_at: String,
}

impl Conversation {
    /// Owning agent id, if the conversation is currently with an agent.
    pub fn assigned_agent(&self) -> Option<&str> {
        self.state.assigned_agent()
    }
}

/// A broadcast campaign row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    /// Message body sent to every recipient.
    pub template: String,
    pub channel: ChannelKind,
    pub status: CampaignStatus,
    /// Token bucket refill rate for the dispatch loop.
    pub rate_per_second: u32,
    /// Position of the last recipient handled; resume starts at cursor + 1.
    pub cursor: i64,
    pub created_at: String,
}

/// One recipient in a campaign's frozen snapshot, ordered by `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub campaign_id: String,
    /// 1-based index within the snapshot; the dispatch order.
    pub position: i64,
    pub address: String,
    /// Conversation the send was appended to, once attempted.
    pub conversation_id: Option<String>,
    pub status: DeliveryStatus,
    pub updated_at: String,
}

/// Per-status recipient counts for a campaign, for progress reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignProgress {
    pub total: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}
