// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard conversation engine.

use thiserror::Error;

use crate::state::ConversationState;
use crate::types::CampaignStatus;

/// The primary error type used across all Switchboard crates.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration problems surfaced past the config crate's own
    /// diagnostics, e.g. a bad value discovered at subsystem startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Message store errors (database connection, query failure, migration).
    ///
    /// Fatal for the operation in progress. Never returned for "no rows" --
    /// an empty catch-up delta is a successful empty list, not this variant.
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound channel or transport errors (delivery failure, bind failure).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A state transition was attempted against a conversation that is no
    /// longer in the expected state. The caller must refetch and retry;
    /// the transition is never applied over stale expectations.
    #[error("state conflict on conversation {conversation_id}: expected {expected}, found {actual}")]
    StateConflict {
        conversation_id: String,
        expected: ConversationState,
        actual: ConversationState,
    },

    /// A campaign lifecycle transition was attempted from the wrong
    /// status, e.g. launching a campaign that is not a draft.
    #[error("campaign {campaign_id} is {actual}, expected {expected}")]
    CampaignConflict {
        campaign_id: String,
        expected: CampaignStatus,
        actual: CampaignStatus,
    },

    /// A manual claim targeted a queue whose concurrency budget is
    /// fully consumed. Automatic assignment parks instead of failing.
    #[error("queue {queue_id} is at capacity")]
    CapacityExhausted { queue_id: String },

    /// A referenced conversation, queue, or campaign does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Bugs and broken invariants; never expected in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}
