// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event payload pushed to subscribed connections.

use serde::Serialize;
use switchboard_core::{ConversationState, Message};

/// One pushed update: a message that landed in a conversation's log,
/// together with the conversation state after the append.
///
/// Audit entries from state transitions flow through here exactly like
/// contact and agent messages, so a subscriber sees claims, releases and
/// closes in true seq order.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEvent {
    pub conversation_id: String,
    pub state: ConversationState,
    pub message: Message,
}

impl ConversationEvent {
    pub fn new(message: Message, state: ConversationState) -> Self {
        Self {
            conversation_id: message.conversation_id.clone(),
            state,
            message,
        }
    }

    /// Seq of the carried message; connections track this as their
    /// optimistic delivery cursor.
    pub fn seq(&self) -> i64 {
        self.message.seq
    }
}
