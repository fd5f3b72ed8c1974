// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-conversation state machine.
//!
//! A conversation is always in exactly one of four states: handled by the
//! bot, waiting for a human, owned by a specific agent, or closed. The
//! legacy flag triple (`open`, `bot_active`, `waiting_for_human`) is a
//! projection of this single value, so the flag invariants -- never both
//! `bot_active` and `waiting_for_human`, `waiting_for_human` implies
//! `open` -- hold by construction and cannot drift.
//!
//! The state is persisted as a single TEXT column using the `Display`/
//! `FromStr` encoding below: `bot`, `waiting`, `agent:<agent_id>`, `closed`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Prefix for the owned-by-agent state encoding.
const AGENT_PREFIX: &str = "agent:";

/// Current owner of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    /// Open, handled by the automated bot.
    Bot,
    /// Open, queued for a human agent.
    WaitingHuman,
    /// Open, owned by the named agent.
    WithAgent(String),
    /// Closed. Any inbound message reopens to [`WaitingHuman`](Self::WaitingHuman).
    Closed,
}

impl ConversationState {
    /// Whether the conversation accepts agent actions.
    pub fn is_open(&self) -> bool {
        !matches!(self, ConversationState::Closed)
    }

    /// Whether the bot currently owns the conversation.
    pub fn bot_active(&self) -> bool {
        matches!(self, ConversationState::Bot)
    }

    /// Whether the conversation is parked on a queue wait-list.
    pub fn waiting_for_human(&self) -> bool {
        matches!(self, ConversationState::WaitingHuman)
    }

    /// The owning agent id, if any.
    pub fn assigned_agent(&self) -> Option<&str> {
        match self {
            ConversationState::WithAgent(id) => Some(id),
            _ => None,
        }
    }

    /// Project this state onto the flag triple used by API consumers.
    pub fn flags(&self) -> StateFlags {
        StateFlags {
            open: self.is_open(),
            bot_active: self.bot_active(),
            waiting_for_human: self.waiting_for_human(),
        }
    }
}

/// Flag projection of a [`ConversationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFlags {
    pub open: bool,
    pub bot_active: bool,
    pub waiting_for_human: bool,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationState::Bot => write!(f, "bot"),
            ConversationState::WaitingHuman => write!(f, "waiting"),
            ConversationState::WithAgent(id) => write!(f, "{AGENT_PREFIX}{id}"),
            ConversationState::Closed => write!(f, "closed"),
        }
    }
}

/// Error returned when a persisted state string cannot be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized conversation state `{0}`")]
pub struct ParseStateError(pub String);

impl FromStr for ConversationState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bot" => Ok(ConversationState::Bot),
            "waiting" => Ok(ConversationState::WaitingHuman),
            "closed" => Ok(ConversationState::Closed),
            other => match other.strip_prefix(AGENT_PREFIX) {
                Some(id) if !id.is_empty() => Ok(ConversationState::WithAgent(id.to_string())),
                _ => Err(ParseStateError(other.to_string())),
            },
        }
    }
}

impl Serialize for ConversationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConversationState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_round_trips_for_simple_states() {
        for state in [
            ConversationState::Bot,
            ConversationState::WaitingHuman,
            ConversationState::Closed,
        ] {
            let encoded = state.to_string();
            let decoded: ConversationState = encoded.parse().unwrap();
            assert_eq!(state, decoded);
        }
    }

    #[test]
    fn with_agent_encodes_agent_id() {
        let state = ConversationState::WithAgent("agent-7".to_string());
        assert_eq!(state.to_string(), "agent:agent-7");
        let decoded: ConversationState = "agent:agent-7".parse().unwrap();
        assert_eq!(decoded.assigned_agent(), Some("agent-7"));
    }

    #[test]
    fn unknown_or_empty_agent_fails_to_parse() {
        assert!("archived".parse::<ConversationState>().is_err());
        assert!("agent:".parse::<ConversationState>().is_err());
        assert!("".parse::<ConversationState>().is_err());
    }

    #[test]
    fn flags_never_combine_bot_and_waiting() {
        let all = [
            ConversationState::Bot,
            ConversationState::WaitingHuman,
            ConversationState::WithAgent("a1".to_string()),
            ConversationState::Closed,
        ];
        for state in &all {
            let flags = state.flags();
            assert!(
                !(flags.bot_active && flags.waiting_for_human),
                "{state} projects both bot_active and waiting_for_human"
            );
            if flags.waiting_for_human {
                assert!(flags.open, "waiting_for_human implies open");
            }
        }
    }

    #[test]
    fn closed_is_not_open() {
        let flags = ConversationState::Closed.flags();
        assert!(!flags.open);
        assert!(!flags.bot_active);
        assert!(!flags.waiting_for_human);
    }

    #[test]
    fn serde_uses_string_encoding() {
        let state = ConversationState::WithAgent("a2".to_string());
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"agent:a2\"");
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    proptest! {
        #[test]
        fn arbitrary_agent_ids_round_trip(id in "[a-zA-Z0-9_-]{1,32}") {
            let state = ConversationState::WithAgent(id);
            let decoded: ConversationState = state.to_string().parse().unwrap();
            prop_assert_eq!(decoded, state);
        }
    }
}
