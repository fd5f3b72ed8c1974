// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the engine and the outside world.

pub mod escalation;
pub mod outbound;

pub use escalation::{EscalationPolicy, KeywordEscalation};
pub use outbound::OutboundChannel;
