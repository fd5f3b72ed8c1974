// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard conversation engine.
//!
//! This crate provides the domain types, error taxonomy, and trait seams
//! used throughout the Switchboard workspace: conversation state, message
//! and campaign rows, the outbound delivery trait, and the escalation
//! policy hook.

pub mod error;
pub mod state;
pub mod traits;
pub mod types;

// Flatten the common items to the crate root.
pub use error::SwitchboardError;
pub use state::{ConversationState, ParseStateError, StateFlags};
pub use types::{
    Campaign, CampaignProgress, CampaignRecipient, CampaignStatus, ChannelKind, ConnectionRole,
    Conversation, DeliveryStatus, Message, NewMessage, SenderKind,
};

// Re-export trait seams at crate root.
pub use traits::{EscalationPolicy, KeywordEscalation, OutboundChannel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switchboard_error_has_all_variants() {
        // Verify every error variant exists and can be constructed.
        let _config = SwitchboardError::Config("test".into());
        let _store = SwitchboardError::Store {
            source: Box::new(std::io::Error::other("test")),
        };
        let _channel = SwitchboardError::Channel {
            message: "test".into(),
            source: None,
        };
        let _conflict = SwitchboardError::StateConflict {
            conversation_id: "c1".into(),
            expected: ConversationState::WaitingHuman,
            actual: ConversationState::Closed,
        };
        let _campaign = SwitchboardError::CampaignConflict {
            campaign_id: "cam1".into(),
            expected: CampaignStatus::Draft,
            actual: CampaignStatus::Running,
        };
        let _capacity = SwitchboardError::CapacityExhausted {
            queue_id: "support".into(),
        };
        let _not_found = SwitchboardError::NotFound {
            kind: "conversation",
            id: "c1".into(),
        };
        let _timeout = SwitchboardError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = SwitchboardError::Internal("test".into());
    }

    #[test]
    fn state_conflict_message_names_both_states() {
        let err = SwitchboardError::StateConflict {
            conversation_id: "c1".into(),
            expected: ConversationState::WithAgent("a1".into()),
            actual: ConversationState::Bot,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("c1"));
        assert!(rendered.contains("agent:a1"));
        assert!(rendered.contains("bot"));
    }

    #[test]
    fn trait_seams_are_exported() {
        // If either trait module is missing or fails to compile, this
        // test won't compile.
        fn _assert_outbound<T: OutboundChannel>() {}
        fn _assert_escalation<T: EscalationPolicy>() {}
        _assert_escalation::<KeywordEscalation>();
    }
}
