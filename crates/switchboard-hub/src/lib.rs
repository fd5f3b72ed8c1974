// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push notification hub for the Switchboard conversation engine.
//!
//! Fans conversation events out to live websocket connections. Push is a
//! cache-invalidation hint, not the source of truth: delivery is
//! at-most-once over bounded per-connection buffers, and clients recover
//! anything missed through the store's catch-up read.

pub mod event;
pub mod hub;

pub use event::ConversationEvent;
pub use hub::{PushHub, CONNECTION_BUFFER_SIZE};
